//! Error types for the Zyte API download handler
//!
//! Separates failures of the API call itself ([`ApiError`]) from the
//! outcome a download handler reports back to the crawl ([`DownloadError`]).

use bytes::Bytes;
use thiserror::Error;

use crate::types::is_truthy;

/// Error returned by an [`ApiClient`](crate::ApiClient) call
#[derive(Error, Debug)]
pub enum ApiError {
    /// Zyte API answered with a non-success status
    ///
    /// `response_content` keeps the raw response body when one was received,
    /// so callers can dig a more specific message out of it.
    #[error("Zyte API request failed ({status}): {message}")]
    Request {
        status: u16,
        message: String,
        response_content: Option<Bytes>,
    },

    /// Network or transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Zyte API answered with something other than a JSON object
    #[error("Invalid Zyte API response: {0}")]
    InvalidResponse(String),

    /// The shared session was already closed
    #[error("Session is closed")]
    SessionClosed,

    /// No API key configured
    #[error("Zyte API key is not configured")]
    MissingApiKey,

    /// Client configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ApiError {
    /// Extract the most helpful human-readable message from the error
    ///
    /// For [`ApiError::Request`] the base message is the error's own message.
    /// When raw response content is present and parses as a JSON object with
    /// a non-empty `detail` field, that detail wins. Every other variant uses
    /// its display form.
    ///
    /// # Example
    /// ```
    /// use zyte_render_core::ApiError;
    /// let error = ApiError::Request {
    ///     status: 429,
    ///     message: "Too Many Requests".to_string(),
    ///     response_content: Some(br#"{"detail": "rate limited"}"#.to_vec().into()),
    /// };
    /// assert_eq!(error.message(), "rate limited");
    /// ```
    pub fn message(&self) -> String {
        match self {
            ApiError::Request {
                message,
                response_content,
                ..
            } => response_content
                .as_deref()
                .and_then(detail_from_content)
                .unwrap_or_else(|| message.clone()),
            other => other.to_string(),
        }
    }

    /// HTTP status of a structured API error
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn detail_from_content(content: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(content).ok()?;
    let data: serde_json::Value = serde_json::from_str(text).ok()?;
    match data.get("detail")? {
        detail if !is_truthy(detail) => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Outcome reported by a [`DownloadHandler`](crate::DownloadHandler) when no
/// response is produced
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Drop the request; never retried by the handler
    #[error("Request ignored ({url}): {reason}")]
    IgnoreRequest { url: String, reason: String },

    /// Plain HTTP download failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl DownloadError {
    pub(crate) fn ignore(url: impl Into<String>, reason: impl Into<String>) -> Self {
        DownloadError::IgnoreRequest {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a request-drop signal
    pub fn is_ignored(&self) -> bool {
        matches!(self, DownloadError::IgnoreRequest { .. })
    }
}

/// Error raised when request meta cannot be translated into API parameters
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParamsError {
    /// Parameters were provided as something other than a JSON object
    #[error("Zyte API parameters should be provided as an object, got {0} instead")]
    NotAMapping(&'static str),
}

/// Error raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Timeout value could not be parsed
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Result type alias for API client calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Result type alias for download handler operations
pub type Result<T> = std::result::Result<T, DownloadError>;
