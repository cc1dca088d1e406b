/*
[INPUT]:  HTTP configuration (scheme/host, timeouts) and injected collaborators
[OUTPUT]: Signed dispatch with challenge detection and a single retry
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing retry behavior
*/

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::{AuthTokenManager, KeyProvider, SecureStorage, TokenStore};
use crate::http::signature::{Clock, RequestSigner, SystemClock};
use crate::http::{BreadError, Result};
use crate::prefs::Preferences;
use crate::types::{ApiResponse, OutboundRequest};

const DEFAULT_SCHEME: &str = "https";
const DEFAULT_HOST: &str = "api.breadwallet.com";

/// A challenged request is resent at most this many times
const MAX_CHALLENGE_RETRIES: u32 = 1;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub scheme: String,
    /// Host, optionally with `:port`
    pub host: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Bounds the `/token` round trip and how long a waiter stays parked
    pub token_fetch_timeout: Duration,
    /// Give parked callers the real outcome of a failed token fetch
    pub share_token_fetch_errors: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            token_fetch_timeout: Duration::from_secs(10),
            share_token_fetch_errors: false,
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `base_url` (e.g. `http://127.0.0.1:8080`)
    pub fn for_base_url(base_url: &str) -> Result<Self> {
        let (scheme, host) = base_url
            .trim_end_matches('/')
            .split_once("://")
            .ok_or_else(|| BreadError::Config(format!("Base URL has no scheme: {base_url}")))?;
        if host.is_empty() || host.contains('/') {
            return Err(BreadError::Config(format!(
                "Base URL must be scheme://host[:port]: {base_url}"
            )));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            ..Self::default()
        })
    }

    /// `{scheme}://{host}`; also the secure-storage account key
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// Capabilities supplied by the host application
#[derive(Debug, Clone)]
pub struct ClientServices {
    pub key_provider: Arc<dyn KeyProvider>,
    pub storage: Arc<dyn SecureStorage>,
    pub preferences: Arc<dyn Preferences>,
    pub clock: Arc<dyn Clock>,
}

impl ClientServices {
    pub fn new(
        key_provider: Arc<dyn KeyProvider>,
        storage: Arc<dyn SecureStorage>,
        preferences: Arc<dyn Preferences>,
    ) -> Self {
        Self {
            key_provider,
            storage,
            preferences,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Main HTTP client for the Bread API
#[derive(Debug)]
pub struct BreadClient {
    http_client: Client,
    config: ClientConfig,
    base_url: Url,
    signer: RequestSigner,
    token_manager: AuthTokenManager,
    key_provider: Arc<dyn KeyProvider>,
    preferences: Arc<dyn Preferences>,
    shutdown: CancellationToken,
}

impl BreadClient {
    /// Create a new client with custom configuration
    pub fn new(config: ClientConfig, services: ClientServices) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        let base_url = Url::parse(&config.base_url())?;
        let tokens = TokenStore::new(services.storage, config.base_url());
        let shutdown = CancellationToken::new();

        let signer = RequestSigner::new(
            tokens.clone(),
            services.key_provider.clone(),
            services.clock,
        );
        let token_manager = AuthTokenManager::new(
            http_client.clone(),
            &base_url,
            &config,
            services.key_provider.clone(),
            tokens,
            services.preferences.clone(),
            shutdown.clone(),
        )?;

        Ok(Self {
            http_client,
            config,
            base_url,
            signer,
            token_manager,
            key_provider: services.key_provider,
            preferences: services.preferences,
            shutdown,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn signer(&self) -> &RequestSigner {
        &self.signer
    }

    pub fn token_manager(&self) -> &AuthTokenManager {
        &self.token_manager
    }

    pub fn preferences(&self) -> &dyn Preferences {
        self.preferences.as_ref()
    }

    /// Fail pending and future calls with [`BreadError::Cancelled`]
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Fetch a new token; see [`AuthTokenManager::get_token`]
    pub async fn get_token(&self) -> Result<()> {
        self.token_manager.get_token().await
    }

    /// Send `request`, renewing the token and resending once on a bread challenge.
    ///
    /// Any response without a challenge is returned as-is, whatever its status.
    /// When the retry is challenged too, that last response is returned.
    pub async fn send(&self, request: &OutboundRequest, authenticated: bool) -> Result<ApiResponse> {
        let mut retry_count = 0;
        loop {
            let response = self.dispatch(request, authenticated, retry_count).await?;
            if !(authenticated && response.is_bread_challenge()) {
                return Ok(response);
            }

            info!(path = %request.path, retry = retry_count, "got authentication challenge from API - will attempt to get token");
            match self.token_manager.get_token().await {
                Err(BreadError::Cancelled) => return Err(BreadError::Cancelled),
                Err(e) if retry_count < MAX_CHALLENGE_RETRIES => {
                    warn!(path = %request.path, error = %e, "error retrieving token - will retry");
                }
                Err(e) => {
                    warn!(path = %request.path, error = %e, "error retrieving token - will no longer retry");
                    return Err(e);
                }
                Ok(()) if retry_count < MAX_CHALLENGE_RETRIES => {
                    info!(path = %request.path, "retrieved token, so retrying the original request");
                }
                Ok(()) => {
                    warn!(path = %request.path, retry = retry_count, "retried token multiple times, will not retry again");
                    return Ok(response);
                }
            }
            retry_count += 1;
        }
    }

    /// [`send`](Self::send), then decode a 2xx JSON body
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &OutboundRequest,
        authenticated: bool,
    ) -> Result<T> {
        let response = self.send(request, authenticated).await?;
        if authenticated && response.is_bread_challenge() {
            return Err(BreadError::ChallengeRetryExhausted {
                path: request.path.clone(),
            });
        }
        if !response.is_success() {
            return Err(BreadError::api_error(response.status, response.text()));
        }
        response.json()
    }

    /// One physical attempt. Signs from the original request every time.
    async fn dispatch(
        &self,
        request: &OutboundRequest,
        authenticated: bool,
        retry_count: u32,
    ) -> Result<ApiResponse> {
        let start = Instant::now();
        let actual = if authenticated && self.key_provider.current_auth_key_pair().is_some() {
            self.signer.sign(request)
        } else {
            request.clone()
        };

        let builder = self.request_builder(&actual)?;
        let outcome = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(BreadError::Cancelled),
            res = execute(builder) => res,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(response) if response.status.as_u16() >= 400 => info!(
                method = %request.method,
                path = %request.path,
                authenticated,
                retry = retry_count,
                status = response.status.as_u16(),
                duration_ms,
                error_body = %response.text(),
                "request completed"
            ),
            Ok(response) => info!(
                method = %request.method,
                path = %request.path,
                authenticated,
                retry = retry_count,
                status = response.status.as_u16(),
                duration_ms,
                "request completed"
            ),
            Err(e) => warn!(
                method = %request.method,
                path = %request.path,
                authenticated,
                retry = retry_count,
                duration_ms,
                error = %e,
                "request encountered connection error"
            ),
        }
        outcome
    }

    /// Build full URL for an API path and its encoded query
    pub(crate) fn url(&self, request: &OutboundRequest) -> Result<Url> {
        let mut url = self.base_url.join(&request.path)?;
        url.set_query(request.query_string().as_deref());
        Ok(url)
    }

    fn request_builder(&self, request: &OutboundRequest) -> Result<RequestBuilder> {
        let url = self.url(request)?;
        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }
        Ok(builder)
    }
}

async fn execute(builder: RequestBuilder) -> Result<ApiResponse> {
    let response = builder.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    // status and headers already arrived, so a broken body is not a transport failure
    let body = match response.bytes().await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            warn!(status = status.as_u16(), error = %e, "failed to read response body");
            Vec::new()
        }
    };
    Ok(ApiResponse {
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::auth::{MemorySecureStorage, StaticKeyProvider};
    use crate::prefs::MemoryPreferences;

    fn services() -> ClientServices {
        ClientServices::new(
            Arc::new(StaticKeyProvider::empty()),
            Arc::new(MemorySecureStorage::new()),
            Arc::new(MemoryPreferences::new()),
        )
    }

    #[test]
    fn test_default_base_url() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url(), "https://api.breadwallet.com");
    }

    #[test]
    fn test_for_base_url_splits_scheme_and_host() {
        let config = ClientConfig::for_base_url("http://127.0.0.1:8080/").unwrap();
        assert_eq!(config.scheme, "http");
        assert_eq!(config.host, "127.0.0.1:8080");
        assert_eq!(config.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_for_base_url_rejects_paths_and_missing_scheme() {
        assert!(ClientConfig::for_base_url("api.breadwallet.com").is_err());
        assert!(ClientConfig::for_base_url("https://api.breadwallet.com/v1").is_err());
    }

    #[test]
    fn test_url_matches_canonical_resource() {
        let client = BreadClient::new(ClientConfig::default(), services()).unwrap();
        let request = OutboundRequest::get("/v1/search")
            .with_query("q", "a b&c")
            .with_query("page", "2");

        let url = client.url(&request).unwrap();
        assert_eq!(
            format!("{}?{}", url.path(), url.query().unwrap()),
            request.resource()
        );
        assert_eq!(url.host_str(), Some("api.breadwallet.com"));
    }
}
