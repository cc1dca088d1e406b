/*
[INPUT]:  Secure storage backend and API base URL
[OUTPUT]: Cached bearer token lookup and persistence
[POS]:    Auth layer - token lifecycle management
[UPDATE]: When token payload or storage keying changes
*/

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{SecureStorage, StorageError};
use crate::http::{BreadError, Result};

/// Bearer token issued by `POST /token`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    #[serde(rename = "userID")]
    pub user_id: String,
}

/// Reads and writes the token for one API environment.
///
/// The account key is the base URL, so distinct environments never share a token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    storage: Arc<dyn SecureStorage>,
    account_key: String,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SecureStorage>, account_key: impl Into<String>) -> Self {
        Self {
            storage,
            account_key: account_key.into(),
        }
    }

    pub fn account_key(&self) -> &str {
        &self.account_key
    }

    /// `Ok(None)` when nothing has been stored yet
    pub fn load(&self) -> Result<Option<AuthToken>> {
        match self.storage.get(&self.account_key) {
            Ok(bytes) => {
                let token = serde_json::from_slice(&bytes).map_err(|e| {
                    BreadError::Storage(StorageError::Corrupt(format!("token blob: {e}")))
                })?;
                Ok(Some(token))
            }
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, token: &AuthToken) -> Result<()> {
        let bytes = serde_json::to_vec(token)?;
        self.storage.set(&self.account_key, &bytes)?;
        Ok(())
    }
}
