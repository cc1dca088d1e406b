/*
[INPUT]:  Key provider, token store, preferences, and HTTP transport
[OUTPUT]: A freshly issued bearer token persisted for the base URL
[POS]:    Auth layer - single-flight token renewal
[UPDATE]: When /token payload, waiter semantics, or timeouts change
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{AuthKeyPair, AuthToken, KeyProvider, TokenStore, device_id};
use crate::http::{BreadError, ClientConfig, Result};
use crate::prefs::Preferences;
use crate::types::{TokenRequest, TokenResponse};

/// Outcome published to waiters; errors travel as text since they are shared
type FetchOutcome = std::result::Result<(), String>;

/// `None` while the fetch is still running
type FetchSlot = Option<FetchOutcome>;

/// Per-client renewal state. Holds a receiver only while a fetch is in flight.
#[derive(Debug, Default)]
struct TokenFetchState {
    in_flight: Option<watch::Receiver<FetchSlot>>,
}

enum Role {
    Leader(watch::Sender<FetchSlot>, AuthKeyPair),
    Waiter(watch::Receiver<FetchSlot>),
}

/// Fetches and renews the API bearer token.
///
/// At most one `/token` round trip runs per manager. Callers arriving while
/// it runs are parked and released together when it finishes. By default a
/// parked caller is released with `Ok(())` whatever the outcome; set
/// [`ClientConfig::share_token_fetch_errors`] to hand them the failure instead.
#[derive(Debug)]
pub struct AuthTokenManager {
    http_client: Client,
    token_url: Url,
    key_provider: Arc<dyn KeyProvider>,
    tokens: TokenStore,
    preferences: Arc<dyn Preferences>,
    fetch_timeout: Duration,
    share_errors: bool,
    shutdown: CancellationToken,
    state: Mutex<TokenFetchState>,
    fetches_started: AtomicU64,
}

impl AuthTokenManager {
    pub fn new(
        http_client: Client,
        base_url: &Url,
        config: &ClientConfig,
        key_provider: Arc<dyn KeyProvider>,
        tokens: TokenStore,
        preferences: Arc<dyn Preferences>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            http_client,
            token_url: base_url.join("/token")?,
            key_provider,
            tokens,
            preferences,
            fetch_timeout: config.token_fetch_timeout,
            share_errors: config.share_token_fetch_errors,
            shutdown,
            state: Mutex::new(TokenFetchState::default()),
            fetches_started: AtomicU64::new(0),
        })
    }

    /// Token persistence for this manager's base URL
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Whether a `/token` round trip is currently outstanding
    pub fn is_fetching(&self) -> bool {
        lock_state(&self.state).in_flight.is_some()
    }

    /// Number of `/token` round trips this manager has started
    pub fn fetches_started(&self) -> u64 {
        self.fetches_started.load(Ordering::SeqCst)
    }

    /// Retrieve a token and store it for this base URL.
    ///
    /// Only the caller that actually performs the fetch sees its error.
    pub async fn get_token(&self) -> Result<()> {
        let role = {
            let mut state = lock_state(&self.state);
            match state.in_flight.as_ref() {
                Some(rx) => Role::Waiter(rx.clone()),
                None => {
                    let key = self
                        .key_provider
                        .current_auth_key_pair()
                        .ok_or(BreadError::WalletNotReady)?;
                    let (tx, rx) = watch::channel(None);
                    state.in_flight = Some(rx);
                    Role::Leader(tx, key)
                }
            }
        };

        match role {
            Role::Waiter(rx) => {
                info!("already fetching auth, waiting");
                self.wait_for_in_flight(rx).await
            }
            Role::Leader(tx, key) => {
                let mut flight = InFlightGuard {
                    state: &self.state,
                    tx,
                    outcome: None,
                };
                self.fetches_started.fetch_add(1, Ordering::SeqCst);

                let result = self.fetch_bounded(&key).await;
                flight.outcome = Some(match &result {
                    Ok(_) => Ok(()),
                    Err(e) => Err(e.to_string()),
                });
                result.map(|_| ())
            }
        }
    }

    async fn wait_for_in_flight(&self, mut rx: watch::Receiver<FetchSlot>) -> Result<()> {
        let released = async move {
            match rx.wait_for(Option::is_some).await {
                Ok(slot) => slot.clone().unwrap_or(Ok(())),
                Err(_) => Err("token fetch abandoned".to_string()),
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(BreadError::Cancelled),
            res = tokio::time::timeout(self.fetch_timeout, released) => {
                res.map_err(|_| BreadError::Timeout { duration: self.fetch_timeout })?
            }
        };

        // the leader may have published just as shutdown fired
        if self.shutdown.is_cancelled() {
            return Err(BreadError::Cancelled);
        }
        match outcome {
            Err(message) if self.share_errors => Err(BreadError::CoalescedFetchFailed(message)),
            _ => Ok(()),
        }
    }

    async fn fetch_bounded(&self, key: &AuthKeyPair) -> Result<AuthToken> {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(BreadError::Cancelled),
            res = tokio::time::timeout(self.fetch_timeout, self.request_token(key)) => match res {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout = ?self.fetch_timeout, "token request timed out");
                    Err(BreadError::Timeout { duration: self.fetch_timeout })
                }
            },
        }
    }

    /// POST /token
    async fn request_token(&self, key: &AuthKeyPair) -> Result<AuthToken> {
        let body = TokenRequest {
            pub_key: key.public_key_base58(),
            device_id: device_id(self.preferences.as_ref()),
        };

        info!(url = %self.token_url, "requesting api token");
        let response = self
            .http_client
            .post(self.token_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(serde_json::to_vec(&body)?)
            .send()
            .await
            .inspect_err(|e| warn!(error = %e, "token request failed"))?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if status != StatusCode::OK {
            warn!(
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&bytes),
                "token error"
            );
            return Err(BreadError::TokenFetchFailed {
                status: status.as_u16(),
            });
        }

        let parsed: TokenResponse = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(error = %e, "token response json error");
            BreadError::MalformedResponse(format!("token response: {e}"))
        })?;

        let token = AuthToken {
            token: parsed.token,
            user_id: parsed.user_id,
        };
        self.tokens.save(&token)?;
        info!(user_id = %token.user_id, account = %self.tokens.account_key(), "stored api token");
        Ok(token)
    }
}

/// Clears the in-flight marker and releases waiters, however the fetch ends
struct InFlightGuard<'a> {
    state: &'a Mutex<TokenFetchState>,
    tx: watch::Sender<FetchSlot>,
    outcome: Option<FetchOutcome>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| Err("token fetch abandoned".to_string()));
        lock_state(self.state).in_flight = None;
        self.tx.send_replace(Some(outcome));
    }
}

fn lock_state(state: &Mutex<TokenFetchState>) -> MutexGuard<'_, TokenFetchState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::auth::{MemorySecureStorage, SecureStorage, StaticKeyProvider};
    use crate::prefs::MemoryPreferences;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn manager_for(
        base: &str,
        key_provider: StaticKeyProvider,
        storage: Arc<MemorySecureStorage>,
    ) -> AuthTokenManager {
        let config = ClientConfig::for_base_url(base).unwrap();
        let base_url = Url::parse(&config.base_url()).unwrap();
        AuthTokenManager::new(
            Client::new(),
            &base_url,
            &config,
            Arc::new(key_provider),
            TokenStore::new(storage, config.base_url()),
            Arc::new(MemoryPreferences::new()),
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_wallet_not_ready_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(path("/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let manager = manager_for(
            &server.uri(),
            StaticKeyProvider::empty(),
            Arc::new(MemorySecureStorage::new()),
        );

        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, BreadError::WalletNotReady));
        assert!(!manager.is_fetching());
        assert_eq!(manager.fetches_started(), 0);
    }

    #[tokio::test]
    async fn test_successful_fetch_persists_token() {
        let server = MockServer::start().await;
        let key = AuthKeyPair::from_secret_key(&[5u8; 32]).unwrap();

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "fresh-token",
                "userID": "user-1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Arc::new(MemorySecureStorage::new());
        let manager = manager_for(&server.uri(), StaticKeyProvider::new(key.clone()), storage.clone());

        manager.get_token().await.unwrap();

        let stored = manager.tokens().load().unwrap().unwrap();
        assert_eq!(stored.token, "fresh-token");
        assert_eq!(stored.user_id, "user-1");
        assert!(storage.get(&server.uri()).is_ok());
        assert!(!manager.is_fetching());

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["pubKey"], key.public_key_base58());
        assert!(body["deviceID"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[tokio::test]
    async fn test_non_200_is_token_fetch_failed() {
        let server = MockServer::start().await;
        Mock::given(path("/token"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let manager = manager_for(
            &server.uri(),
            StaticKeyProvider::new(AuthKeyPair::generate()),
            Arc::new(MemorySecureStorage::new()),
        );

        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, BreadError::TokenFetchFailed { status: 403 }));
        assert!(!manager.is_fetching());
        assert!(manager.tokens().load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_releases_flag() {
        let server = MockServer::start().await;
        Mock::given(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "only"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let manager = manager_for(
            &server.uri(),
            StaticKeyProvider::new(AuthKeyPair::generate()),
            Arc::new(MemorySecureStorage::new()),
        );

        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, BreadError::MalformedResponse(_)));
        assert!(!manager.is_fetching());

        // failures are not cached
        let err = manager.get_token().await.unwrap_err();
        assert!(matches!(err, BreadError::MalformedResponse(_)));
        assert_eq!(manager.fetches_started(), 2);
    }
}
