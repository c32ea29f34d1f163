//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `CredentialStore`: the access/refresh token pair, durable via a `TokenStorage`
//! - `RefreshCoordinator`: single-flight refresh-token exchange
//! - `SessionController`: login/logout and the authenticated state
//!
//! Token validity is never judged locally; only server responses expire a token.

pub mod credentials;
pub mod exchange;
pub mod refresh;
pub mod session;
pub mod storage;

pub use credentials::{CredentialPair, CredentialStore};
pub use refresh::{RefreshCoordinator, RefreshError};
pub use session::{LoginError, LogoutReason, SessionController, SessionEvent, SessionHooks, SessionState};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, TokenStorage};
