use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::storage::{MemoryStorage, TokenStorage};

/// The access/refresh token pair as persisted in the `access_token` and
/// `refresh_token` slots. An absent slot is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Holder of the current credentials.
///
/// Reads come from an in-memory mirror so every `set`/`clear` is visible to
/// the next `get` immediately; each write also goes through to the durable
/// [`TokenStorage`] backend. The store never inspects token validity.
pub struct CredentialStore {
    current: RwLock<CredentialPair>,
    backend: Box<dyn TokenStorage>,
}

impl CredentialStore {
    /// Open a store over a durable backend, loading whatever it holds.
    pub fn open(backend: impl TokenStorage + 'static) -> Result<Self> {
        let current = backend.load()?;
        debug!(
            backend = backend.name(),
            has_access = current.access_token.is_some(),
            has_refresh = current.refresh_token.is_some(),
            "Credential store opened"
        );
        Ok(Self {
            current: RwLock::new(current),
            backend: Box::new(backend),
        })
    }

    /// A non-durable store, mostly for tests and throwaway sessions.
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(CredentialPair::default()),
            backend: Box::new(MemoryStorage::new()),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn get(&self) -> CredentialPair {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub fn set(&self, pair: CredentialPair) {
        let mut current = self.write();
        self.persist(&pair);
        *current = pair;
    }

    /// Replace the access token after a refresh. The refresh token is kept
    /// unless the server rotated it.
    pub fn set_access_token(&self, access_token: String, rotated_refresh: Option<String>) {
        let mut current = self.write();
        let pair = CredentialPair {
            access_token: Some(access_token),
            refresh_token: rotated_refresh.or_else(|| current.refresh_token.take()),
        };
        self.persist(&pair);
        *current = pair;
    }

    /// Like [`set_access_token`](Self::set_access_token), but only while the
    /// stored refresh token is still `expected`. Returns whether it wrote.
    pub fn compare_and_set_access(
        &self,
        expected: &str,
        access_token: String,
        rotated_refresh: Option<String>,
    ) -> bool {
        let mut current = self.write();
        if current.refresh_token.as_deref() != Some(expected) {
            return false;
        }
        let pair = CredentialPair {
            access_token: Some(access_token),
            refresh_token: rotated_refresh.or_else(|| current.refresh_token.take()),
        };
        self.persist(&pair);
        *current = pair;
        true
    }

    /// Clear only while the stored refresh token is still `expected`.
    pub fn clear_if_refresh(&self, expected: &str) -> bool {
        let mut current = self.write();
        if current.refresh_token.as_deref() != Some(expected) {
            return false;
        }
        if let Err(e) = self.backend.clear() {
            warn!(backend = self.backend.name(), error = %e, "Failed to clear stored credentials");
        }
        *current = CredentialPair::default();
        true
    }

    pub fn clear(&self) {
        let mut current = self.write();
        if let Err(e) = self.backend.clear() {
            warn!(backend = self.backend.name(), error = %e, "Failed to clear stored credentials");
        }
        *current = CredentialPair::default();
    }

    /// Backend failures are logged, not returned: the running process keeps
    /// working from the in-memory pair.
    fn persist(&self, pair: &CredentialPair) {
        if let Err(e) = self.backend.save(pair) {
            warn!(backend = self.backend.name(), error = %e, "Failed to persist credentials");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CredentialPair> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CredentialPair> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
