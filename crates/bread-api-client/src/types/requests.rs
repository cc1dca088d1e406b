/*
[INPUT]:  Method, path, query, headers, and body of an outbound call
[OUTPUT]: Immutable request values ready for signing and dispatch
[POS]:    Data layer - request model shared by signer and client
[UPDATE]: When request fields or encoding rules change
*/

use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::http::Result;

/// An API call before it touches the wire.
///
/// Signing never mutates a request; it returns a copy with extra headers.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Overrides the signing clock when building the `Date` header.
    pub timestamp: Option<DateTime<Utc>>,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timestamp: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Append a query parameter, preserving insertion order
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the body and mark it `application/json`
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Header value as text; lookups are case-insensitive
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Form-encoded query string, `None` when there are no parameters
    pub fn query_string(&self) -> Option<String> {
        if self.query.is_empty() {
            return None;
        }
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        Some(encoded)
    }

    /// Path plus `?query` when a query is present
    pub fn resource(&self) -> String {
        match self.query_string() {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_deref().unwrap_or_default()
    }
}

/// Body of `POST /token`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenRequest {
    #[serde(rename = "pubKey")]
    pub pub_key: String,
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_without_query() {
        let request = OutboundRequest::get("/v1/fee-per-kb");
        assert_eq!(request.query_string(), None);
        assert_eq!(request.resource(), "/v1/fee-per-kb");
    }

    #[test]
    fn test_resource_keeps_query_order() {
        let request = OutboundRequest::get("/v1/search")
            .with_query("z", "1")
            .with_query("a", "two words");
        assert_eq!(request.resource(), "/v1/search?z=1&a=two+words");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = OutboundRequest::post("/token")
            .with_json(&serde_json::json!({"a": 1}))
            .unwrap();
        assert_eq!(request.header_str("Content-Type"), Some("application/json"));
        assert_eq!(request.header_str("content-type"), Some("application/json"));
        assert_eq!(request.body_bytes(), br#"{"a":1}"#);
    }

    #[test]
    fn test_token_request_wire_names() {
        let body = TokenRequest {
            pub_key: "abc".to_string(),
            device_id: "DEV".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"pubKey": "abc", "deviceID": "DEV"})
        );
    }
}
