//! Core data types for the download handler
//!
//! Contains the request and response structures that flow through
//! [`DownloadHandler`](crate::DownloadHandler) implementations.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};
use url::Url;

/// Request meta key that routes a request through Zyte API
pub const ZYTE_API_META_KEY: &str = "zyte_api";

/// Flag attached to responses produced through Zyte API
pub const ZYTE_API_FLAG: &str = "zyte-api";

/// A unit of crawl work: the URL to fetch plus free-form metadata
///
/// Setting a truthy `zyte_api` entry in `meta` opts the request into the
/// Zyte API path; its value carries the extra API parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Target URL
    pub url: Url,

    /// Arbitrary request metadata
    pub meta: Map<String, Value>,
}

impl Request {
    /// Create a request with empty metadata
    pub fn new(url: Url) -> Self {
        Self {
            url,
            meta: Map::new(),
        }
    }

    /// Attach a metadata entry
    ///
    /// # Example
    /// ```
    /// use serde_json::json;
    /// use zyte_render_core::Request;
    /// let url = "https://example.com".parse().unwrap();
    /// let request = Request::new(url).with_meta("zyte_api", json!({"javascript": true}));
    /// assert!(request.uses_zyte_api());
    /// ```
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Route this request through Zyte API with the given parameters
    pub fn with_zyte_api(self, params: Value) -> Self {
        self.with_meta(ZYTE_API_META_KEY, params)
    }

    /// Raw Zyte API parameters from request meta, if any
    pub fn zyte_api_params(&self) -> Option<&Value> {
        self.meta.get(ZYTE_API_META_KEY)
    }

    /// Whether the request opted into the Zyte API path
    pub fn uses_zyte_api(&self) -> bool {
        self.zyte_api_params().is_some_and(is_truthy)
    }
}

/// A downloaded page handed back to the crawl
#[derive(Debug, Clone)]
pub struct Response {
    /// URL of the originating request
    pub url: Url,

    /// HTTP status
    pub status: StatusCode,

    /// Response headers (empty for Zyte API responses)
    pub headers: HeaderMap,

    /// Raw body
    pub body: Bytes,

    /// Markers describing how the response was produced
    pub flags: Vec<String>,

    /// The request this response answers
    pub request: Request,
}

impl Response {
    /// Body decoded as UTF-8, lossy
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Whether the response carries the given flag
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// JSON truthiness: null, false, zero and empty strings, arrays or objects
/// are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Short name of a JSON value's type, for log messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
