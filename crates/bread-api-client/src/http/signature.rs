/*
[INPUT]:  Outbound requests, cached token, and authentication key pair
[OUTPUT]: Canonical request text and signed copies with Authorization headers
[POS]:    HTTP layer - request signing for authenticated endpoints
[UPDATE]: When changing canonical form, signing algorithm, or header format
*/

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE, HeaderValue};
use tracing::{debug, warn};

use crate::auth::{AuthKeyPair, KeyProvider, TokenStore, double_sha256};
use crate::http::{BreadError, Result};
use crate::types::{AUTH_SCHEME, OutboundRequest};

/// RFC 1123 date in GMT; chrono's names are English regardless of locale
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Source of the current time for `Date` headers
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// base58 of the double SHA-256 of the body, for POST/PUT/PATCH with a body
pub fn body_digest_base58(request: &OutboundRequest) -> String {
    let hashes_body = matches!(request.method, Method::POST | Method::PUT | Method::PATCH);
    match request.body.as_deref() {
        Some(body) if hashes_body && !body.is_empty() => {
            bs58::encode(double_sha256(body)).into_string()
        }
        _ => String::new(),
    }
}

/// Build the newline-joined text that gets hashed and signed.
///
/// Lines: method, body digest (or empty), content-type, date, resource.
pub fn build_canonical_string(request: &OutboundRequest) -> String {
    let body_digest = body_digest_base58(request);
    let resource = request.resource();
    let parts = [
        request.method.as_str(),
        body_digest.as_str(),
        request.header_str(CONTENT_TYPE.as_str()).unwrap_or(""),
        request.header_str(DATE.as_str()).unwrap_or(""),
        resource.as_str(),
    ];
    parts.join("\n")
}

/// `bread {token}:{base58(compact signature)}`
pub fn authorization_value(token: &str, key: &AuthKeyPair, canonical: &str) -> Result<HeaderValue> {
    let digest = double_sha256(canonical.as_bytes());
    let signature = key.compact_sign(&digest)?;
    let value = format!(
        "{AUTH_SCHEME} {token}:{}",
        bs58::encode(signature).into_string()
    );
    let mut header = HeaderValue::from_str(&value)
        .map_err(|e| BreadError::Crypto(format!("Unusable authorization header: {e}")))?;
    header.set_sensitive(true);
    Ok(header)
}

/// Signs requests with the cached token and the wallet's authentication key
#[derive(Debug, Clone)]
pub struct RequestSigner {
    tokens: TokenStore,
    key_provider: Arc<dyn KeyProvider>,
    clock: Arc<dyn Clock>,
}

impl RequestSigner {
    pub fn new(tokens: TokenStore, key_provider: Arc<dyn KeyProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            tokens,
            key_provider,
            clock,
        }
    }

    /// Return a signed copy of `request`.
    ///
    /// `Date` is always filled in first since it is part of the signed text.
    /// Without a cached token or a key the copy carries no `Authorization`;
    /// storage failures are logged and treated the same way.
    pub fn sign(&self, request: &OutboundRequest) -> OutboundRequest {
        let mut signed = request.clone();
        if !signed.headers.contains_key(DATE) {
            let at = signed.timestamp.unwrap_or_else(|| self.clock.now());
            if let Ok(value) = HeaderValue::from_str(&http_date(at)) {
                signed.headers.insert(DATE, value);
            }
        }

        let token = match self.tokens.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!(path = %signed.path, "no cached api token, sending unsigned");
                return signed;
            }
            Err(e) => {
                warn!(path = %signed.path, error = %e, "error fetching cached api token");
                return signed;
            }
        };
        let Some(key) = self.key_provider.current_auth_key_pair() else {
            debug!(path = %signed.path, "no auth key, sending unsigned");
            return signed;
        };

        let canonical = build_canonical_string(&signed);
        match authorization_value(&token.token, &key, &canonical) {
            Ok(value) => {
                signed.headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!(path = %signed.path, error = %e, "failed to sign request"),
        }
        signed
    }
}
