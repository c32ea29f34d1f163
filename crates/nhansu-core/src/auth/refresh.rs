//! Single-flight refresh-token exchange.
//!
//! However many calls hit an expired access token at the same time, only one
//! `POST /token/refresh/` goes out. The first caller starts the exchange and
//! parks a shared future in the pending slot; later callers clone that future
//! and receive the very same outcome. The exchange runs as its own task, so it
//! completes and updates the store even if every caller has gone away. It
//! releases the slot itself, after the store has been updated, so nobody can
//! join a finished exchange and nobody can start a second one against the
//! same stale token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::exchange::{RefreshRequest, RefreshResponse, REFRESH_PATH};
use super::{CredentialStore, LogoutReason, SessionHooks};
use crate::api::{RequestEnvelope, Transport, TransportError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("No refresh token stored")]
    MissingRefreshToken,

    #[error("Refresh token rejected (status {status})")]
    Rejected { status: u16 },

    #[error("Network error during token refresh: {0}")]
    Network(#[from] TransportError),

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("Token refresh task did not complete: {0}")]
    Interrupted(String),
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// Identifies one in-flight exchange; at most one exists at a time.
struct PendingRefresh {
    ticket: u64,
    future: RefreshFuture,
}

type PendingSlot = Arc<Mutex<Option<PendingRefresh>>>;

pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    hooks: Arc<dyn SessionHooks>,
    pending: PendingSlot,
    next_ticket: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        Self {
            transport,
            store,
            hooks,
            pending: Arc::new(Mutex::new(None)),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Exchange the stored refresh token for a new access token, or join the
    /// exchange already in flight.
    pub async fn refresh(&self) -> Result<String, RefreshError> {
        let future = {
            let pending = lock(&self.pending);
            self.join_or_start(pending)
        };
        future.await
    }

    /// Called after the server rejected `rejected`. If the stored access token
    /// has moved on since that call was sent, the caller just needs the
    /// current one and no exchange is made.
    ///
    /// Never hands back `rejected` itself from an exchange it merely joined:
    /// if that exchange was made for an older refresh token and the store has
    /// moved on, a fresh exchange for the current refresh token is started.
    pub async fn refresh_rejected(&self, rejected: Option<&str>) -> Result<String, RefreshError> {
        let mut restarted = false;
        loop {
            let future = {
                let pending = lock(&self.pending);
                if pending.is_none() {
                    if let Some(current) = self.store.access_token() {
                        if rejected != Some(current.as_str()) {
                            debug!("Access token already replaced, skipping exchange");
                            return Ok(current);
                        }
                    }
                }
                self.join_or_start(pending)
            };

            let access = future.await?;
            if restarted || rejected != Some(access.as_str()) {
                return Ok(access);
            }
            debug!("Joined exchange returned the rejected token, exchanging again");
            restarted = true;
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending).is_some()
    }

    /// Forget the in-flight exchange, if any. Called when login or logout
    /// replaces the credentials; the old exchange still finishes, but its
    /// result no longer applies to the stored pair and nobody new joins it.
    pub fn reset(&self) {
        if let Some(abandoned) = lock(&self.pending).take() {
            debug!(ticket = abandoned.ticket, "Pending refresh detached from session");
        }
    }

    fn join_or_start(&self, mut pending: MutexGuard<'_, Option<PendingRefresh>>) -> RefreshFuture {
        if let Some(ref existing) = *pending {
            debug!(ticket = existing.ticket, "Joining refresh already in flight");
            return existing.future.clone();
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(ticket, "Starting token refresh");

        // Captured now, under the slot lock, not when the task first runs
        let refresh = self.store.refresh_token();
        let task = tokio::spawn(exchange(
            ticket,
            refresh,
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            Arc::clone(&self.hooks),
            Arc::clone(&self.pending),
        ));

        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(RefreshError::Interrupted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        *pending = Some(PendingRefresh {
            ticket,
            future: future.clone(),
        });
        future
    }
}

fn lock(slot: &PendingSlot) -> MutexGuard<'_, Option<PendingRefresh>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn exchange(
    ticket: u64,
    refresh: Option<String>,
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    hooks: Arc<dyn SessionHooks>,
    pending: PendingSlot,
) -> Result<String, RefreshError> {
    let result = match refresh {
        Some(refresh) => {
            let outcome = request_access(transport.as_ref(), &refresh).await;
            reconcile(&store, &refresh, outcome)
        }
        None => match store.access_token() {
            // A login landed after the exchange was started
            Some(access) if store.refresh_token().is_some() => Ok(Refreshed::Superseded(access)),
            _ => {
                store.clear();
                Err(RefreshError::MissingRefreshToken)
            }
        },
    };

    {
        let mut slot = lock(&pending);
        if slot.as_ref().is_some_and(|p| p.ticket == ticket) {
            *slot = None;
        }
    }

    match result {
        Ok(Refreshed::Stored(ref access)) => {
            info!(ticket, "Access token refreshed");
            hooks.credentials_refreshed();
            Ok(access.clone())
        }
        Ok(Refreshed::Superseded(access)) => {
            debug!(ticket, "Credentials replaced during refresh, using current access token");
            Ok(access)
        }
        Err(e) => {
            warn!(ticket, error = %e, "Token refresh failed, session credentials cleared");
            hooks.credentials_expired(LogoutReason::RefreshFailed(e.clone()));
            Err(e)
        }
    }
}

enum Refreshed {
    Stored(String),
    /// The pair was replaced (login/logout) while the exchange was in flight.
    Superseded(String),
}

/// Apply the exchange outcome to the store, unless the pair it was made for
/// is no longer the stored one.
fn reconcile(
    store: &CredentialStore,
    sent_refresh: &str,
    outcome: Result<RefreshResponse, RefreshError>,
) -> Result<Refreshed, RefreshError> {
    match outcome {
        Ok(resp) => {
            if store.compare_and_set_access(sent_refresh, resp.access.clone(), resp.refresh) {
                Ok(Refreshed::Stored(resp.access))
            } else {
                store
                    .access_token()
                    .map(Refreshed::Superseded)
                    .ok_or(RefreshError::MissingRefreshToken)
            }
        }
        Err(e) => {
            if store.clear_if_refresh(sent_refresh) {
                return Err(e);
            }
            store.access_token().map(Refreshed::Superseded).ok_or(e)
        }
    }
}

async fn request_access(transport: &dyn Transport, refresh: &str) -> Result<RefreshResponse, RefreshError> {
    let body = serde_json::to_value(RefreshRequest { refresh })
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
    let request = RequestEnvelope::post(REFRESH_PATH).with_body(body);

    let response = transport.execute(&request).await?;
    if !response.status().is_success() {
        return Err(RefreshError::Rejected {
            status: response.status().as_u16(),
        });
    }
    response
        .json::<RefreshResponse>()
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))
}
