//! Download handlers
//!
//! [`ZyteApiDownloadHandler`] sends requests flagged with `zyte_api` meta
//! through Zyte API and hands everything else to the handler it replaces,
//! usually an [`HttpDownloadHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, error};

use crate::client::{ApiClient, ClientConfig, Session, ZyteApiClient, create_session};
use crate::error::{ApiError, ApiResult, DownloadError, Result};
use crate::params::{BROWSER_HTML_FIELD, build_api_payload};
use crate::stats::{REQUEST_COUNT_STAT, StatsCollector};
use crate::types::{Request, Response, ZYTE_API_FLAG};

/// Something that turns a [`Request`] into a [`Response`]
#[async_trait]
pub trait DownloadHandler: Send + Sync {
    /// Download a request
    ///
    /// # Errors
    /// - `IgnoreRequest` when the request should be dropped without retry
    /// - `HttpError` when a plain download fails
    async fn download_request(&self, request: Request) -> Result<Response>;

    /// Release resources held by the handler
    async fn close(&self) {}
}

#[async_trait]
impl<T: DownloadHandler + ?Sized> DownloadHandler for Arc<T> {
    async fn download_request(&self, request: Request) -> Result<Response> {
        (**self).download_request(request).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Plain HTTP download handler
#[derive(Debug, Clone)]
pub struct HttpDownloadHandler {
    client: reqwest::Client,
}

impl HttpDownloadHandler {
    /// Create a handler with a default reqwest client
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(DownloadError::Http)?;
        Ok(Self { client })
    }

    /// Create a handler around an existing reqwest client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DownloadHandler for HttpDownloadHandler {
    async fn download_request(&self, request: Request) -> Result<Response> {
        let response = self.client.get(request.url.clone()).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response {
            url: request.url.clone(),
            status,
            headers,
            body,
            flags: Vec::new(),
            request,
        })
    }
}

/// Settings read once when the Zyte API handler is built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerSettings {
    /// Job id attached to every API call as `jobId`
    pub job_id: Option<String>,
}

impl HandlerSettings {
    /// Read the job id from the `JOB` environment variable
    ///
    /// An empty value counts as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            job_id: lookup("JOB").filter(|job| !job.is_empty()),
        }
    }

    /// Settings with the given job id
    pub fn with_job_id(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
        }
    }
}

/// Download handler that renders flagged requests through Zyte API
///
/// Requests whose meta carries a truthy `zyte_api` value are translated into
/// an API payload and sent through the injected [`ApiClient`] over one shared
/// [`Session`]. Every failure on that path becomes
/// [`DownloadError::IgnoreRequest`]; nothing is retried here. All other
/// requests go to the fallback handler untouched.
pub struct ZyteApiDownloadHandler<C, F> {
    fallback: F,
    client: C,
    session: Arc<Session>,
    stats: Arc<dyn StatsCollector>,
    job_id: Option<String>,
}

impl<F: DownloadHandler> ZyteApiDownloadHandler<ZyteApiClient, F> {
    /// Build a handler backed by [`ZyteApiClient`] with its own session
    ///
    /// # Errors
    /// - `MissingApiKey` if the configuration has no API key
    /// - `HttpError` if the session cannot be created
    pub fn with_config(
        fallback: F,
        config: &ClientConfig,
        stats: Arc<dyn StatsCollector>,
        settings: &HandlerSettings,
    ) -> ApiResult<Self> {
        let client = ZyteApiClient::with_config(config)?;
        let session = Arc::new(create_session(config)?);
        Ok(Self::new(fallback, client, session, stats, settings))
    }
}

impl<C: ApiClient, F: DownloadHandler> ZyteApiDownloadHandler<C, F> {
    /// Build a handler from injected collaborators
    ///
    /// # Arguments
    /// * `fallback` - Handler for requests without `zyte_api` meta
    /// * `client` - Zyte API client
    /// * `session` - Session shared by all API calls, closed by [`close`](DownloadHandler::close)
    /// * `stats` - Collector for the request counter
    /// * `settings` - Read once here; later changes are not picked up
    pub fn new(
        fallback: F,
        client: C,
        session: Arc<Session>,
        stats: Arc<dyn StatsCollector>,
        settings: &HandlerSettings,
    ) -> Self {
        Self {
            fallback,
            client,
            session,
            stats,
            job_id: settings.job_id.clone(),
        }
    }

    /// Job id attached to API calls, if any
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// The shared API session
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    async fn download_via_api(&self, request: Request) -> Result<Response> {
        let url = request.url.as_str();
        let params = request.zyte_api_params().unwrap_or(&Value::Null);

        let build = build_api_payload(&request.url, params, self.job_id()).map_err(|e| {
            error!("{e} ({url}).");
            DownloadError::ignore(url, e.to_string())
        })?;

        let mut api_response = match self.client.request_raw(&build.payload, &self.session).await
        {
            Ok(data) => data,
            Err(e @ ApiError::Request { status, .. }) => {
                let message = e.message();
                error!("Got Zyte API error ({status}) while processing URL ({url}): {message}");
                return Err(DownloadError::ignore(url, message));
            }
            Err(e) => {
                error!("Got an error when processing Zyte API request ({url}): {e}");
                return Err(DownloadError::ignore(url, e.to_string()));
            }
        };

        self.stats.inc_value(REQUEST_COUNT_STAT);

        let html = match api_response.remove(BROWSER_HTML_FIELD) {
            Some(Value::String(html)) => html,
            _ => {
                error!("Zyte API response has no `{BROWSER_HTML_FIELD}` string ({url}).");
                return Err(DownloadError::ignore(
                    url,
                    format!("response has no `{BROWSER_HTML_FIELD}` string"),
                ));
            }
        };

        debug!("Rendered {url} through Zyte API ({} bytes)", html.len());

        Ok(Response {
            url: request.url.clone(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from(html),
            flags: vec![ZYTE_API_FLAG.to_string()],
            request,
        })
    }
}

#[async_trait]
impl<C: ApiClient, F: DownloadHandler> DownloadHandler for ZyteApiDownloadHandler<C, F> {
    async fn download_request(&self, request: Request) -> Result<Response> {
        if request.uses_zyte_api() {
            self.download_via_api(request).await
        } else {
            self.fallback.download_request(request).await
        }
    }

    async fn close(&self) {
        self.fallback.close().await;
        self.session.close();
    }
}
