//! Application entry point for the `tuya-sensorsink` poller.
//!
//! This binary runs one batch pass and exits:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Authenticating against the Tuya Cloud API
//! - Fetching every configured device's properties
//! - Writing the readings to each configured time-series sink
//!
//! Exit code is 0 when the batch completes (individual device or write
//! failures included) and 1 on a fatal error: bad configuration or failed
//! authentication.
//!
//! # Environment Variables
//! See [`sensorsink::config::load_from_env`] for the full list.
//! - `SENSORSINK_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `SENSORSINK_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, io::IsTerminal, process::ExitCode};

use dotenvy::dotenv;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::{Context, Result};

use sensorsink::{build_sinks, config, orchestrator, CloudClient, Credentials};

// ---

#[tokio::main]
async fn main() -> ExitCode {
    // ---
    dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    // ---
    let cfg = config::load_from_env()?;
    cfg.log_config();

    let credentials = Credentials {
        client_id: cfg.client_id.clone(),
        client_secret: cfg.client_secret.clone(),
        base_url: cfg.api_base_url.clone(),
        timeout: cfg.request_timeout,
    };
    let client = CloudClient::new(credentials).context("Failed to build Tuya client")?;
    let sinks = build_sinks(&cfg).context("Failed to build sinks")?;

    let report = orchestrator::run(&client, &cfg.device_ids, &sinks).await?;

    for sink in &report.sinks {
        tracing::info!(
            "{} write results: {}",
            sink.sink,
            serde_json::to_string(&sink.results).unwrap_or_default()
        );
    }

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `SENSORSINK_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, falling back to `SENSORSINK_LOG_LEVEL`
///
/// Called once at startup, after `.env` is loaded so the variables above can
/// come from it.
fn init_tracing() {
    // ---
    let span_events = match env::var("SENSORSINK_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("SENSORSINK_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
