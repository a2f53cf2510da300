//! Zyte API Download Handler Core Library
//!
//! Routes crawl requests flagged with `zyte_api` meta through Zyte API and
//! turns the rendered HTML into an ordinary [`Response`].
//!
//! # Overview
//!
//! This crate provides:
//! - Translation of request meta into a Zyte API payload, with an allow list
//!   and protection of the fixed `url` / `browserHtml` fields
//! - An async [`ApiClient`] seam with a reqwest-backed [`ZyteApiClient`]
//! - [`ZyteApiDownloadHandler`], which wraps the handler it supersedes and
//!   drops (never retries) requests whose API call fails
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use zyte_render_core::{
//!     ClientConfig, DownloadHandler, HandlerSettings, HttpDownloadHandler, MemoryStats,
//!     Request, ZyteApiDownloadHandler,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = ZyteApiDownloadHandler::with_config(
//!         HttpDownloadHandler::new()?,
//!         &ClientConfig::from_env()?,
//!         Arc::new(MemoryStats::new()),
//!         &HandlerSettings::from_env(),
//!     )?;
//!
//!     let request = Request::new("https://example.com".parse()?)
//!         .with_zyte_api(json!({"javascript": true}));
//!     let response = handler.download_request(request).await?;
//!     println!("{}", response.text());
//!
//!     handler.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Dropped requests
//!
//! Every failure on the Zyte API path surfaces as
//! [`DownloadError::IgnoreRequest`]. Retrying is left to whoever schedules
//! the requests.

mod client;
mod error;
mod handler;
pub mod params;
mod stats;
mod types;

// Re-export client types
pub use client::{ApiClient, ClientConfig, DEFAULT_API_URL, Session, ZyteApiClient, create_session};

// Re-export error types
pub use error::{ApiError, ApiResult, ConfigError, DownloadError, ParamsError, Result};

// Re-export handlers
pub use handler::{DownloadHandler, HandlerSettings, HttpDownloadHandler, ZyteApiDownloadHandler};

// Re-export payload translation
pub use params::{ALLOWED_PARAMS, ApiPayload, PayloadBuild, SkipReason, SkippedParam, build_api_payload};

// Re-export stats
pub use stats::{MemoryStats, REQUEST_COUNT_STAT, StatsCollector};

// Re-export data types
pub use types::{Request, Response, ZYTE_API_FLAG, ZYTE_API_META_KEY};
