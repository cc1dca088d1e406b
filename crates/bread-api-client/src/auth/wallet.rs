/*
[INPUT]:  Wallet secret material (held by the host application)
[OUTPUT]: The current authentication key pair, if the wallet is ready
[POS]:    Auth layer - wallet integration abstraction
[UPDATE]: When adding new key sources or changing readiness rules
*/

use std::fmt;
use std::sync::RwLock;

use super::AuthKeyPair;

/// Supplies the deterministic authentication key pair derived from the wallet.
///
/// Implementations must answer from memory: no network I/O, no blocking.
pub trait KeyProvider: Send + Sync + fmt::Debug {
    /// `None` until the wallet has been created or unlocked
    fn current_auth_key_pair(&self) -> Option<AuthKeyPair>;
}

/// Key provider holding a key set by the application, or nothing
#[derive(Debug, Default)]
pub struct StaticKeyProvider {
    key: RwLock<Option<AuthKeyPair>>,
}

impl StaticKeyProvider {
    pub fn new(key: AuthKeyPair) -> Self {
        Self {
            key: RwLock::new(Some(key)),
        }
    }

    /// A provider whose wallet is not ready yet
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set(&self, key: Option<AuthKeyPair>) {
        let mut guard = self.key.write().unwrap_or_else(|e| e.into_inner());
        *guard = key;
    }
}

impl KeyProvider for StaticKeyProvider {
    fn current_auth_key_pair(&self) -> Option<AuthKeyPair> {
        let guard = self.key.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }
}
