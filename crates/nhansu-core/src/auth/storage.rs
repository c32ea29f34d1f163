//! Durable backends for the credential pair.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tempfile::NamedTempFile;
use tracing::warn;

use super::CredentialPair;

/// Credentials file name in the cache directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Keychain service name
const SERVICE_NAME: &str = "nhansu";

const ACCESS_SLOT: &str = "access_token";
const REFRESH_SLOT: &str = "refresh_token";

/// Synchronous, durable key/value holder for the two token slots.
pub trait TokenStorage: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self) -> Result<CredentialPair>;

    fn save(&self, pair: &CredentialPair) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// JSON file with `access_token` / `refresh_token` keys.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    #[cfg(unix)]
    fn restrict_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .context("Failed to restrict credentials file permissions")
    }

    #[cfg(not(unix))]
    fn restrict_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }
}

impl TokenStorage for FileStorage {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self) -> Result<CredentialPair> {
        let path = self.path();
        if !path.exists() {
            return Ok(CredentialPair::default());
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read credentials file")?;
        match serde_json::from_str(&contents) {
            Ok(pair) => Ok(pair),
            Err(e) => {
                // A corrupt file reads as logged out
                warn!(path = %path.display(), error = %e, "Ignoring unparseable credentials file");
                Ok(CredentialPair::default())
            }
        }
    }

    /// Write to an owner-only temp file in the same directory, then rename it
    /// over `credentials.json`. Readers see the old file or the new one, never
    /// a partial write.
    fn save(&self, pair: &CredentialPair) -> Result<()> {
        std::fs::create_dir_all(&self.dir).context("Failed to create credentials directory")?;
        let contents = serde_json::to_string_pretty(pair)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).context("Failed to create temp credentials file")?;
        Self::restrict_permissions(tmp.path())?;
        tmp.write_all(contents.as_bytes())
            .context("Failed to write temp credentials file")?;
        tmp.as_file().sync_all().context("Failed to sync temp credentials file")?;
        tmp.persist(self.path())
            .map_err(|e| e.error)
            .context("Failed to replace credentials file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove credentials file")?;
        }
        Ok(())
    }
}

/// One OS keychain entry per slot.
pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, slot: &str) -> Result<Entry> {
        Entry::new(&self.service, slot).context("Failed to create keyring entry")
    }

    fn read_slot(&self, slot: &str) -> Result<Option<String>> {
        match self.entry(slot)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn write_slot(&self, slot: &str, value: Option<&str>) -> Result<()> {
        let entry = self.entry(slot)?;
        match value {
            Some(value) => entry
                .set_password(value)
                .context("Failed to store token in keychain"),
            None => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(e).context("Failed to delete token from keychain"),
            },
        }
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStorage for KeyringStorage {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn load(&self) -> Result<CredentialPair> {
        Ok(CredentialPair {
            access_token: self.read_slot(ACCESS_SLOT)?,
            refresh_token: self.read_slot(REFRESH_SLOT)?,
        })
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.write_slot(ACCESS_SLOT, pair.access_token.as_deref())?;
        self.write_slot(REFRESH_SLOT, pair.refresh_token.as_deref())
    }

    fn clear(&self) -> Result<()> {
        self.write_slot(ACCESS_SLOT, None)?;
        self.write_slot(REFRESH_SLOT, None)
    }
}

/// Process-lifetime storage; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    pair: Mutex<CredentialPair>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: Mutex::new(pair),
        }
    }
}

impl TokenStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> Result<CredentialPair> {
        Ok(self.pair.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        *self.pair.lock().unwrap_or_else(|p| p.into_inner()) = pair.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.pair.lock().unwrap_or_else(|p| p.into_inner()) = CredentialPair::default();
        Ok(())
    }
}
