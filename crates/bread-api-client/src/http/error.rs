/*
[INPUT]:  Error sources (transport, token endpoint, storage, serialization, signing)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::StorageError;

/// Main error type for the Bread API client
#[derive(Error, Debug)]
pub enum BreadError {
    /// No authentication key is available yet
    #[error("Wallet not ready")]
    WalletNotReady,

    /// `/token` answered with something other than 200
    #[error("Unable to retrieve API token (status {status})")]
    TokenFetchFailed { status: u16 },

    /// Response body was undecodable or missing required fields
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// No HTTP response was received at all
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server kept challenging after the single allotted retry
    #[error("Authentication challenge persisted after retry for {path}")]
    ChallengeRetryExhausted { path: String },

    /// The client was shut down while the call was pending
    #[error("Request cancelled")]
    Cancelled,

    /// A bounded wait elapsed
    #[error("Timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Outcome of a token fetch run by another caller
    #[error("Coalesced token fetch failed: {0}")]
    CoalescedFetchFailed(String),

    /// API returned an unexpected status
    #[error("API error (code {code}): {message}")]
    Api { code: i32, message: String },

    /// Secure storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Key material could not be used
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BreadError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BreadError::Transport(_)
                | BreadError::Timeout { .. }
                | BreadError::TokenFetchFailed { .. }
                | BreadError::CoalescedFetchFailed(_)
        )
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            BreadError::WalletNotReady
                | BreadError::TokenFetchFailed { .. }
                | BreadError::ChallengeRetryExhausted { .. }
                | BreadError::CoalescedFetchFailed(_)
        )
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        BreadError::Api {
            code: status.as_u16() as i32,
            message: message.into(),
        }
    }
}

/// Result type alias for Bread API operations
pub type Result<T> = std::result::Result<T, BreadError>;
