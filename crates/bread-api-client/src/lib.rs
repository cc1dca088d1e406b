/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Bread API client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod config;
pub mod http;
pub mod prefs;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{
    AuthKeyPair,
    AuthToken,
    AuthTokenManager,
    FileSecureStorage,
    KeyProvider,
    MemorySecureStorage,
    PersistentKeyProvider,
    SecureStorage,
    StaticKeyProvider,
    StorageError,
    TokenStore,
};

// Re-export commonly used types from http
pub use http::{
    BreadClient,
    BreadError,
    ClientConfig,
    ClientServices,
    Clock,
    RequestSigner,
    Result,
    SystemClock,
};

pub use config::FileConfig;
pub use prefs::{FilePreferences, MemoryPreferences, Preferences};

// Re-export all types
pub use types::*;
