/*
[INPUT]:  Account keys and opaque credential blobs
[OUTPUT]: Persisted/retrieved blobs with a distinct not-found condition
[POS]:    Auth layer - secure credential storage contract and backends
[UPDATE]: When adding storage backends or changing on-disk layout
*/

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("No item stored for account")]
    NotFound,

    #[error("Storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Stored item is corrupt: {0}")]
    Corrupt(String),
}

/// Opaque per-account blob storage (keychain equivalent).
///
/// Implementations must report a missing item as [`StorageError::NotFound`],
/// never as a generic failure.
pub trait SecureStorage: Send + Sync + fmt::Debug {
    fn get(&self, account: &str) -> Result<Vec<u8>, StorageError>;

    fn set(&self, account: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Process-local storage, used by tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemorySecureStorage {
    items: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySecureStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStorage for MemorySecureStorage {
    fn get(&self, account: &str) -> Result<Vec<u8>, StorageError> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.get(account).cloned().ok_or(StorageError::NotFound)
    }

    fn set(&self, account: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert(account.to_string(), data.to_vec());
        Ok(())
    }
}

/// One owner-only file per account under a directory
#[derive(Debug, Clone)]
pub struct FileSecureStorage {
    dir: PathBuf,
}

impl FileSecureStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Account keys are URLs, so file names use their base64url form
    pub fn item_path(&self, account: &str) -> PathBuf {
        self.dir
            .join(format!("{}.item", URL_SAFE_NO_PAD.encode(account.as_bytes())))
    }
}

impl SecureStorage for FileSecureStorage {
    fn get(&self, account: &str) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.item_path(account)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn set(&self, account: &str, data: &[u8]) -> Result<(), StorageError> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)?;
        }

        let path = self.item_path(account);
        fs::write(&path, data)?;
        restrict_to_owner(&path)?;
        Ok(())
    }
}

#[cfg(unix)]
pub(crate) fn restrict_to_owner(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
pub(crate) fn restrict_to_owner(_path: &Path) -> io::Result<()> {
    Ok(())
}
