/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for bread-api-client tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bread_api_client::{
    AuthKeyPair, AuthToken, BreadClient, ClientConfig, ClientServices, Clock, MemoryPreferences,
    MemorySecureStorage, SecureStorage, StaticKeyProvider, TokenStore,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "test-api-token";
pub const TEST_USER_ID: &str = "user-42";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Deterministic secp256k1 key for testing
pub fn test_key_pair() -> AuthKeyPair {
    AuthKeyPair::from_secret_key(&[7u8; 32]).expect("valid test key")
}

/// Shared pieces of a test client, kept so tests can inspect them afterwards
pub struct TestHarness {
    pub client: Arc<BreadClient>,
    pub storage: Arc<MemorySecureStorage>,
    pub key_provider: Arc<StaticKeyProvider>,
    pub preferences: Arc<MemoryPreferences>,
}

impl TestHarness {
    pub fn stored_token(&self) -> Option<AuthToken> {
        TokenStore::new(self.storage.clone(), self.client.config().base_url())
            .load()
            .expect("token store readable")
    }
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::for_base_url(&server.uri()).expect("mock server uri");
    config.timeout = Duration::from_secs(5);
    config
}

/// Clock pinned to one instant so `Date` and signatures are reproducible
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn build_client(config: ClientConfig, key: Option<AuthKeyPair>) -> TestHarness {
    build_client_with_clock(config, key, None)
}

pub fn build_client_with_clock(
    config: ClientConfig,
    key: Option<AuthKeyPair>,
    clock: Option<Arc<dyn Clock>>,
) -> TestHarness {
    let storage = Arc::new(MemorySecureStorage::new());
    let key_provider = Arc::new(match key {
        Some(key) => StaticKeyProvider::new(key),
        None => StaticKeyProvider::empty(),
    });
    let preferences = Arc::new(MemoryPreferences::new());

    let mut services =
        ClientServices::new(key_provider.clone(), storage.clone(), preferences.clone());
    if let Some(clock) = clock {
        services = services.with_clock(clock);
    }
    let client = Arc::new(BreadClient::new(config, services).expect("client builds"));

    TestHarness {
        client,
        storage,
        key_provider,
        preferences,
    }
}

/// Client with a key but no stored token
pub fn client_with_key(server: &MockServer) -> TestHarness {
    build_client(config_for(server), Some(test_key_pair()))
}

/// Client with a key and an already stored token
pub fn client_with_token(server: &MockServer, token: &str) -> TestHarness {
    store_token(client_with_key(server), token)
}

pub fn store_token(harness: TestHarness, token: &str) -> TestHarness {
    let stored = serde_json::to_vec(&AuthToken {
        token: token.to_string(),
        user_id: TEST_USER_ID.to_string(),
    })
    .expect("serialize token");
    harness
        .storage
        .set(&harness.client.config().base_url(), &stored)
        .expect("store token");
    harness
}

pub fn token_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token": TEST_TOKEN,
        "userID": TEST_USER_ID,
    }))
}

pub fn challenge_response() -> ResponseTemplate {
    ResponseTemplate::new(401).insert_header("www-authenticate", "bread realm=\"api\"")
}

/// `/token` mock that must be hit exactly `times` times
pub async fn mount_token_endpoint(server: &MockServer, response: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(response)
        .expect(times)
        .mount(server)
        .await;
}

/// Number of requests the server saw for `route`
pub async fn hits(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}
