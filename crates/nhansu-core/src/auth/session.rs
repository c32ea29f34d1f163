use std::sync::{Arc, RwLock, RwLockWriteGuard};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::exchange::{LoginRequest, TokenPairResponse, LOGIN_PATH};
use super::{CredentialPair, CredentialStore, RefreshCoordinator, RefreshError};
use crate::api::{RequestDispatcher, RequestEnvelope, Transport, TransportError};

/// Session events are rare; a small buffer is plenty for slow subscribers.
const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    UserRequested,
    RefreshFailed(RefreshError),
    /// The server rejected a call again right after a successful refresh.
    RejectedAfterRetry { status: u16 },
}

/// What the hosting application is told about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    /// A refresh-only credential pair was silently turned back into a session.
    Restored,
    /// Leave protected views and show the login view.
    NavigateToLogin { reason: LogoutReason },
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("Username and password required")]
    MissingCredentials,

    #[error("Invalid username or password (status {status})")]
    InvalidCredentials { status: u16 },

    #[error("Unable to connect to server: {0}")]
    Network(#[from] TransportError),

    #[error("Invalid login response: {0}")]
    InvalidResponse(String),
}

/// How the refresh and dispatch paths report back to the session owner.
pub trait SessionHooks: Send + Sync {
    fn credentials_refreshed(&self);

    /// Unrecoverable authorization failure; tear the session down.
    fn credentials_expired(&self, reason: LogoutReason);
}

/// Shared state behind [`SessionController`], also handed to the refresh and
/// dispatch paths as their [`SessionHooks`].
struct SessionTracker {
    state: RwLock<SessionState>,
    store: Arc<CredentialStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionTracker {
    fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn logged_in(&self, pair: CredentialPair, username: &str) {
        {
            let mut state = self.write();
            self.store.set(pair);
            *state = SessionState::Authenticated;
        }
        self.emit(SessionEvent::LoggedIn {
            username: username.to_string(),
        });
    }

    /// Clear credentials and drop to Unauthenticated. Core-triggered teardowns
    /// only announce the transition, so concurrent failures navigate once.
    fn end(&self, reason: LogoutReason) {
        let was_authenticated = {
            let mut state = self.write();
            self.store.clear();
            std::mem::replace(&mut *state, SessionState::Unauthenticated) == SessionState::Authenticated
        };

        if was_authenticated || reason == LogoutReason::UserRequested {
            self.emit(SessionEvent::NavigateToLogin { reason });
        } else {
            debug!(?reason, "Session already ended");
        }
    }
}

impl SessionHooks for SessionTracker {
    fn credentials_refreshed(&self) {
        let restored = {
            let mut state = self.write();
            // A logout may have cleared the store since the exchange wrote to it
            if self.store.access_token().is_none() {
                debug!("Refresh completed after credentials were cleared");
                return;
            }
            std::mem::replace(&mut *state, SessionState::Authenticated) == SessionState::Unauthenticated
        };
        if restored {
            info!("Session restored from refresh token");
            self.emit(SessionEvent::Restored);
        }
    }

    fn credentials_expired(&self, reason: LogoutReason) {
        warn!(?reason, "Session expired");
        self.end(reason);
    }
}

/// Owner of the authenticated/unauthenticated state.
///
/// Builds the refresh coordinator and dispatcher over the same store and
/// transport so every credential writer goes through one place.
pub struct SessionController {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    tracker: Arc<SessionTracker>,
    refresher: Arc<RefreshCoordinator>,
    dispatcher: RequestDispatcher,
}

impl SessionController {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<CredentialStore>) -> Self {
        let initial = if store.access_token().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        };
        debug!(?initial, "Session state derived from stored credentials");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let tracker = Arc::new(SessionTracker {
            state: RwLock::new(initial),
            store: Arc::clone(&store),
            events,
        });
        let hooks: Arc<dyn SessionHooks> = tracker.clone();

        let refresher = Arc::new(RefreshCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::clone(&hooks),
        ));
        let dispatcher = RequestDispatcher::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::clone(&refresher),
            hooks,
        );

        Self {
            transport,
            store,
            tracker,
            refresher,
            dispatcher,
        }
    }

    /// Exchange username/password for a token pair. On any failure the store
    /// and the session state are left exactly as they were.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), LoginError> {
        if username.is_empty() || password.is_empty() {
            return Err(LoginError::MissingCredentials);
        }

        let body = serde_json::to_value(LoginRequest { username, password })
            .map_err(|e| LoginError::InvalidResponse(e.to_string()))?;
        let request = RequestEnvelope::post(LOGIN_PATH).with_body(body);

        let response = match self.transport.execute(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Login request failed");
                return Err(e.into());
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            warn!(status, "Login rejected");
            return Err(LoginError::InvalidCredentials { status });
        }

        let tokens: TokenPairResponse = response
            .json()
            .map_err(|e| LoginError::InvalidResponse(e.to_string()))?;

        self.tracker
            .logged_in(CredentialPair::new(tokens.access, tokens.refresh), username);
        self.refresher.reset();
        info!(username, "Login successful");
        Ok(())
    }

    /// Clear credentials, go Unauthenticated, and tell the host to show the
    /// login view. Never talks to the server.
    pub fn logout(&self) {
        info!("Logging out");
        self.tracker.end(LogoutReason::UserRequested);
        self.refresher.reset();
    }

    /// One silent re-authentication attempt for a stored pair that has a
    /// refresh token but no access token. Returns whether the session is
    /// authenticated afterwards; a failed attempt clears the pair.
    pub async fn restore(&self) -> bool {
        if self.is_authenticated() {
            return true;
        }
        if self.store.refresh_token().is_none() {
            return false;
        }

        match self.refresher.refresh().await {
            Ok(_) => self.is_authenticated(),
            Err(e) => {
                info!(error = %e, "Stored refresh token could not restore the session");
                false
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    pub fn state(&self) -> SessionState {
        self.tracker.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tracker.events.subscribe()
    }

    pub fn dispatcher(&self) -> RequestDispatcher {
        self.dispatcher.clone()
    }

    pub fn refresher(&self) -> Arc<RefreshCoordinator> {
        Arc::clone(&self.refresher)
    }

    pub fn store(&self) -> Arc<CredentialStore> {
        Arc::clone(&self.store)
    }
}
