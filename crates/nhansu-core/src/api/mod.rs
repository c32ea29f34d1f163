//! REST API client module for the HR management service.
//!
//! Calls flow `ApiClient` → `RequestDispatcher` → `Transport`. The dispatcher
//! attaches the JWT bearer token obtained from `/token/` and handles expiry;
//! `ApiClient` turns the pass-through responses into typed models.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use dispatcher::RequestDispatcher;
pub use error::{ApiError, DispatchError, TransportError};
pub use transport::{HttpResponse, ReqwestTransport, RequestEnvelope, Transport, DEFAULT_TIMEOUT_SECS};
