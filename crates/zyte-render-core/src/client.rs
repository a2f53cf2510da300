//! Zyte API client and shared network session
//!
//! The download handler talks to Zyte API only through the [`ApiClient`]
//! trait, so the transport can be swapped out. [`ZyteApiClient`] is the
//! reqwest-backed implementation.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ApiError, ApiResult, ConfigError};
use crate::params::ApiPayload;
use crate::types::json_type_name;

/// Default Zyte API extraction endpoint
pub const DEFAULT_API_URL: &str = "https://api.zyte.com/v1/extract";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Configuration for the Zyte API client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Extraction endpoint (default: [`DEFAULT_API_URL`])
    pub api_url: String,
    /// API key, sent as the basic auth user name
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `ZYTE_API_KEY`, `ZYTE_API_URL` and
    /// `ZYTE_API_TIMEOUT`, falling back to defaults for unset values
    ///
    /// # Errors
    /// - `InvalidTimeout` if `ZYTE_API_TIMEOUT` is not a whole number of seconds
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(key) = lookup("ZYTE_API_KEY").filter(|k| !k.is_empty()) {
            config.api_key = Some(key);
        }
        if let Some(url) = lookup("ZYTE_API_URL").filter(|u| !u.is_empty()) {
            config.api_url = url;
        }
        if let Some(timeout) = lookup("ZYTE_API_TIMEOUT") {
            config.timeout_secs = timeout
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(timeout.clone()))?;
        }
        Ok(config)
    }
}

/// Network session shared by every API call of a crawl
///
/// Wraps one connection-pooling `reqwest::Client`. Closing drops the client,
/// releasing its idle connections; any further call made through the
/// session fails with [`ApiError::SessionClosed`].
#[derive(Debug)]
pub struct Session {
    client: RwLock<Option<reqwest::Client>>,
}

impl Session {
    /// Handle to the underlying HTTP client, unless the session is closed
    pub fn client(&self) -> ApiResult<reqwest::Client> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ApiError::SessionClosed)
    }

    /// Close the session and drop its connection pool; closing twice is a no-op
    pub fn close(&self) {
        let client = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if client.is_some() {
            debug!("Zyte API session closed");
        }
    }

    /// Whether the session has been closed
    pub fn is_closed(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Create the shared session for a crawl
///
/// # Errors
/// - `HttpError` if the HTTP client cannot be built
pub fn create_session(config: &ClientConfig) -> ApiResult<Session> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(ApiError::Http)?;

    Ok(Session {
        client: RwLock::new(Some(client)),
    })
}

/// Asynchronous Zyte API client
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Send one extraction request and return the raw JSON object
    ///
    /// # Errors
    /// - `Request` when the API answers with a non-success status
    /// - any other [`ApiError`] for transport or decoding failures
    async fn request_raw(
        &self,
        payload: &ApiPayload,
        session: &Session,
    ) -> ApiResult<Map<String, Value>>;
}

#[async_trait]
impl<T: ApiClient + ?Sized> ApiClient for std::sync::Arc<T> {
    async fn request_raw(
        &self,
        payload: &ApiPayload,
        session: &Session,
    ) -> ApiResult<Map<String, Value>> {
        (**self).request_raw(payload, session).await
    }
}

/// reqwest-backed [`ApiClient`]
#[derive(Debug, Clone)]
pub struct ZyteApiClient {
    api_url: String,
    api_key: String,
}

impl ZyteApiClient {
    /// Create a client from environment configuration
    ///
    /// # Errors
    /// - `MissingApiKey` if `ZYTE_API_KEY` is unset
    /// - `Config` if the environment holds an unusable timeout
    pub fn from_env() -> ApiResult<Self> {
        let config = ClientConfig::from_env()?;
        Self::with_config(&config)
    }

    /// Create a client with custom configuration
    ///
    /// # Errors
    /// - `MissingApiKey` if the configuration has no API key
    pub fn with_config(config: &ClientConfig) -> ApiResult<Self> {
        let api_key = config.api_key.clone().ok_or(ApiError::MissingApiKey)?;
        Ok(Self {
            api_url: config.api_url.clone(),
            api_key,
        })
    }

    /// Endpoint this client posts to
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl ApiClient for ZyteApiClient {
    async fn request_raw(
        &self,
        payload: &ApiPayload,
        session: &Session,
    ) -> ApiResult<Map<String, Value>> {
        let client = session.client()?;
        let response = client
            .post(&self.api_url)
            .basic_auth(&self.api_key, Some(""))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let content = response.bytes().await?;

        if !status.is_success() {
            return Err(ApiError::Request {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("Unknown status")
                    .to_string(),
                response_content: Some(content),
            });
        }

        match serde_json::from_slice::<Value>(&content) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(ApiError::InvalidResponse(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(ApiError::InvalidResponse(e.to_string())),
        }
    }
}
