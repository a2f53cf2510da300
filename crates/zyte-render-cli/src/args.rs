//! Command-line arguments and their translation into request meta

use clap::Parser;
use serde_json::{Map, Value};
use url::Url;
use zyte_render_core::{ClientConfig, HandlerSettings};

/// Fetch pages through Zyte API browser rendering
#[derive(Debug, Parser)]
#[command(name = "zyte-render", version, about)]
pub struct Args {
    /// URLs to fetch
    #[arg(required = true)]
    pub urls: Vec<Url>,

    /// Disable JavaScript execution while rendering
    #[arg(long)]
    pub no_javascript: bool,

    /// Country code to render the page from (e.g. "US")
    #[arg(long)]
    pub geolocation: Option<String>,

    /// Data echoed back in the API response, as JSON or a plain string
    #[arg(long)]
    pub echo_data: Option<String>,

    /// Extra raw API parameter as key=value; keys outside the allow list are skipped
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Job id attached to every API call [env: JOB]
    #[arg(long)]
    pub job_id: Option<String>,

    /// Zyte API endpoint [env: ZYTE_API_URL, default: https://api.zyte.com/v1/extract]
    #[arg(long)]
    pub api_url: Option<String>,

    /// Zyte API key [env: ZYTE_API_KEY]
    #[arg(long)]
    pub api_key: Option<String>,

    /// Request timeout in seconds [env: ZYTE_API_TIMEOUT, default: 60]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Skip Zyte API and download the pages directly
    #[arg(long)]
    pub plain: bool,

    /// Print only the URL, status and body size of each page
    #[arg(long)]
    pub summary: bool,
}

impl Args {
    /// Apply command-line overrides on top of environment configuration
    pub fn client_config(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(api_url) = self.api_url.clone().filter(|u| !u.is_empty()) {
            config.api_url = api_url;
        }
        if let Some(api_key) = self.api_key.clone().filter(|k| !k.is_empty()) {
            config.api_key = Some(api_key);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        config
    }

    /// Apply `--job-id` on top of environment settings
    pub fn handler_settings(&self, mut settings: HandlerSettings) -> HandlerSettings {
        if let Some(job_id) = self.job_id.clone().filter(|j| !j.is_empty()) {
            settings.job_id = Some(job_id);
        }
        settings
    }

    /// Build the `zyte_api` meta value for every request
    ///
    /// # Errors
    /// Returns a message for a `--param` without `=`
    pub fn api_params(&self) -> Result<Value, String> {
        let mut params = Map::new();
        params.insert("javascript".to_string(), Value::Bool(!self.no_javascript));
        if let Some(geolocation) = &self.geolocation {
            params.insert("geolocation".to_string(), Value::String(geolocation.clone()));
        }
        if let Some(echo_data) = &self.echo_data {
            params.insert("echoData".to_string(), parse_value(echo_data));
        }
        for raw in &self.params {
            let (key, value) = raw
                .split_once('=')
                .ok_or_else(|| format!("Invalid --param `{raw}`, expected KEY=VALUE"))?;
            params.insert(key.trim().to_string(), parse_value(value));
        }
        Ok(Value::Object(params))
    }
}

/// Parse a value as JSON, keeping it as a plain string when that fails
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
