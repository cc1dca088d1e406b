/*
[INPUT]:  Raw HTTP responses and JSON bodies
[OUTPUT]: Response envelope plus typed endpoint payloads
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or challenge detection changes
*/

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{BreadError, Result};

/// Authorization scheme shared by request signing and challenge detection
pub const AUTH_SCHEME: &str = "bread";

/// Everything the server sent back for one physical attempt
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// True when `WWW-Authenticate` starts with the bread scheme, ignoring case
    pub fn is_bread_challenge(&self) -> bool {
        self.headers
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().starts_with(AUTH_SCHEME))
            .unwrap_or(false)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| BreadError::MalformedResponse(format!("{e}")))
    }
}

/// Successful `POST /token` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(rename = "userID")]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeePerKbResponse {
    #[serde(default)]
    pub fee_per_kb: Option<u64>,
}

/// Why a fee lookup produced no usable value
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeLookupError {
    /// Body undecodable, or `fee_per_kb` missing or zero
    #[error("invalid json")]
    InvalidJson,

    #[error("bad network connection")]
    BadNetworkConnection,
}

/// Result of `GET /v1/fee-per-kb`; `value` is 0 whenever `error` is set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePerKb {
    pub value: u64,
    pub error: Option<FeeLookupError>,
}

impl FeePerKb {
    pub fn failed(error: FeeLookupError) -> Self {
        Self {
            value: 0,
            error: Some(error),
        }
    }
}

/// One element of the `/me/features` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntry {
    pub name: String,
    pub enabled: bool,
}
