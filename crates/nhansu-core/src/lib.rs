//! Nhansu core - authenticated client for the HR management REST API.
//!
//! The interesting part of this crate is the authenticated-request path:
//!
//! - [`auth::CredentialStore`] holds the access/refresh token pair durably.
//! - [`api::RequestDispatcher`] attaches the bearer token to every call and
//!   replays a call exactly once after a 401/403 and a successful refresh.
//! - [`auth::RefreshCoordinator`] exchanges the refresh token, with at most one
//!   exchange in flight no matter how many calls are waiting on it.
//! - [`auth::SessionController`] owns the authenticated state, login/logout,
//!   and emits [`auth::SessionEvent`]s the hosting application reacts to.
//!
//! Resource screens live outside this crate; they use [`api::ApiClient`] and
//! [`aggregate::fetch_all`].

pub mod aggregate;
pub mod api;
pub mod auth;
pub mod config;
pub mod models;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, DispatchError, RequestDispatcher, RequestEnvelope};
pub use auth::{CredentialPair, CredentialStore, SessionController, SessionEvent, SessionState};
pub use config::Config;
