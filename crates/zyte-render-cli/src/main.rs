//! zyte-render: fetch pages through the Zyte API download handler
//!
//! ```text
//! ZYTE_API_KEY=... zyte-render https://example.com --geolocation US
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use zyte_render_core::{
    ClientConfig, DownloadHandler, HandlerSettings, HttpDownloadHandler, MemoryStats,
    REQUEST_COUNT_STAT, Request, Response, StatsCollector, ZyteApiDownloadHandler,
};

mod args;

use args::Args;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn print_response(response: &Response, summary: bool) {
    if summary {
        println!(
            "{} {} {} bytes{}",
            response.url,
            response.status.as_u16(),
            response.body.len(),
            if response.flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", response.flags.join(","))
            }
        );
    } else {
        println!("{}", response.text());
    }
}

fn request_count_line(stats: &dyn StatsCollector) -> String {
    format!(
        "{} = {}",
        REQUEST_COUNT_STAT,
        stats.get_value(REQUEST_COUNT_STAT).unwrap_or(0)
    )
}

async fn run(args: Args) -> Result<bool, String> {
    let params = args.api_params()?;
    let fallback = HttpDownloadHandler::new().map_err(|e| e.to_string())?;
    let config = args.client_config(ClientConfig::from_env().map_err(|e| e.to_string())?);
    let settings = args.handler_settings(HandlerSettings::from_env());
    let stats = Arc::new(MemoryStats::new());

    let handler: Box<dyn DownloadHandler> = if args.plain {
        Box::new(fallback)
    } else {
        Box::new(
            ZyteApiDownloadHandler::with_config(fallback, &config, stats.clone(), &settings)
                .map_err(|e| e.to_string())?,
        )
    };

    let mut all_ok = true;
    for url in &args.urls {
        let mut request = Request::new(url.clone());
        if !args.plain {
            request = request.with_zyte_api(params.clone());
        }
        match handler.download_request(request).await {
            Ok(response) => print_response(&response, args.summary),
            Err(e) => {
                error!("{e}");
                all_ok = false;
            }
        }
    }

    eprintln!("{}", request_count_line(stats.as_ref()));
    handler.close().await;
    Ok(all_ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_count_line_without_calls() {
        let stats = MemoryStats::new();
        assert_eq!(request_count_line(&stats), "zyte-api/request_count = 0");
    }

    #[test]
    fn test_request_count_line_after_calls() {
        let stats = MemoryStats::new();
        stats.inc_value(REQUEST_COUNT_STAT);
        stats.inc_value(REQUEST_COUNT_STAT);
        assert_eq!(request_count_line(&stats), "zyte-api/request_count = 2");
    }
}
