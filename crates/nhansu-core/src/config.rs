//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, request timeout, where credentials are kept, and the last used
//! username.
//!
//! Configuration is stored at `~/.config/nhansu/config.json`. The
//! `NHANSU_API_URL` and `NHANSU_STORAGE` environment variables override it.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ReqwestTransport, DEFAULT_TIMEOUT_SECS};
use crate::auth::{CredentialStore, FileStorage, KeyringStorage, SessionController};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "nhansu";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

const ENV_API_URL: &str = "NHANSU_API_URL";
const ENV_STORAGE: &str = "NHANSU_STORAGE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "keyring" => Ok(StorageKind::Keyring),
            "memory" => Ok(StorageKind::Memory),
            other => Err(anyhow::anyhow!("Unknown credential storage: {}", other)),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_timeout(),
            storage: StorageKind::default(),
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment overrides; `lookup` stands in for `std::env::var`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            debug!(url = %url, "API URL overridden from environment");
            self.base_url = url;
        }
        if let Some(storage) = lookup(ENV_STORAGE).filter(|v| !v.is_empty()) {
            self.storage = storage.parse()?;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Open the configured credential backend.
    pub fn open_store(&self) -> Result<CredentialStore> {
        match self.storage {
            StorageKind::File => CredentialStore::open(FileStorage::new(self.cache_dir()?)),
            StorageKind::Keyring => CredentialStore::open(KeyringStorage::new()),
            StorageKind::Memory => Ok(CredentialStore::in_memory()),
        }
    }

    pub fn transport(&self) -> Result<ReqwestTransport> {
        let timeout = Duration::from_secs(self.request_timeout_secs);
        ReqwestTransport::with_timeout(&self.base_url, timeout).context("Failed to create HTTP client")
    }

    /// Wire store, transport and session together.
    pub fn session(&self) -> Result<SessionController> {
        let store = Arc::new(self.open_store()?);
        let transport = Arc::new(self.transport()?);
        Ok(SessionController::new(transport, store))
    }
}
