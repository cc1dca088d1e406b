/*
[INPUT]:  Wallet key material, secure storage, and the token endpoint
[OUTPUT]: Key pairs, cached tokens, device identity, and token renewal
[POS]:    Auth layer - handles Bread API authentication
[UPDATE]: When auth flow or signature methods change
*/

pub mod device;
pub mod keys;
pub mod manager;
pub mod persistent_key;
pub mod storage;
pub mod token;
pub mod wallet;

pub use device::device_id;
pub use keys::{AuthKeyPair, COMPACT_SIGNATURE_LEN, double_sha256};
pub use manager::AuthTokenManager;
pub use persistent_key::PersistentKeyProvider;
pub use storage::{FileSecureStorage, MemorySecureStorage, SecureStorage, StorageError};
pub use token::{AuthToken, TokenStore};
pub use wallet::{KeyProvider, StaticKeyProvider};
