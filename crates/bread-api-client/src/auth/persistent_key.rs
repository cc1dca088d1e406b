/*
[INPUT]:  Account name and key storage directory
[OUTPUT]: Persistent authentication key pairs
[POS]:    Auth layer - file-backed key provider
[UPDATE]: When key storage format or file naming conventions change
*/

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::warn;

use super::storage::restrict_to_owner;
use super::{AuthKeyPair, KeyProvider};

/// File-backed authentication key for one account.
///
/// The key file is read when the provider is built and by [`load`](Self::load);
/// [`KeyProvider::current_auth_key_pair`] only consults memory.
#[derive(Debug)]
pub struct PersistentKeyProvider {
    key_dir: PathBuf,
    account: String,
    cached: RwLock<Option<AuthKeyPair>>,
}

impl PersistentKeyProvider {
    /// Create a provider for `account`, picking up an existing key file
    pub fn new(key_dir: impl AsRef<Path>, account: impl Into<String>) -> Self {
        let provider = Self {
            key_dir: key_dir.as_ref().to_path_buf(),
            account: account.into(),
            cached: RwLock::new(None),
        };
        provider.load();
        provider
    }

    /// Get the existing key or create and persist a new one
    pub fn get_or_create(&self) -> io::Result<AuthKeyPair> {
        if let Some(key) = self.cached() {
            return Ok(key);
        }
        if let Some(key) = self.load() {
            return Ok(key);
        }
        let key = AuthKeyPair::generate();
        self.save(&key)?;
        Ok(key)
    }

    /// Re-read the key file, caching the key on success
    pub fn load(&self) -> Option<AuthKeyPair> {
        let key = self.read_key_file()?;
        let mut cached = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(key.clone());
        Some(key)
    }

    /// Save the key to disk with owner-only permissions
    pub fn save(&self, key: &AuthKeyPair) -> io::Result<()> {
        if !self.key_dir.exists() {
            fs::create_dir_all(&self.key_dir)?;
        }

        let path = self.key_file_path();
        fs::write(&path, STANDARD.encode(key.secret_key_bytes()))?;
        restrict_to_owner(&path)?;

        let mut cached = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(key.clone());
        Ok(())
    }

    pub fn key_file_path(&self) -> PathBuf {
        self.key_dir
            .join(format!("{}_secp256k1.key", self.account))
    }

    fn cached(&self) -> Option<AuthKeyPair> {
        self.cached
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn read_key_file(&self) -> Option<AuthKeyPair> {
        let path = self.key_file_path();
        let content = fs::read_to_string(&path).ok()?;
        let bytes = STANDARD.decode(content.trim()).ok()?;

        let Ok(key_bytes) = <[u8; 32]>::try_from(bytes.as_slice()) else {
            warn!(path = %path.display(), len = bytes.len(), "ignoring key file with bad length");
            return None;
        };
        match AuthKeyPair::from_secret_key(&key_bytes) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unusable key file");
                None
            }
        }
    }
}

impl KeyProvider for PersistentKeyProvider {
    fn current_auth_key_pair(&self) -> Option<AuthKeyPair> {
        self.cached()
    }
}
