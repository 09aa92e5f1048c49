//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin,
//! dispatches them to the search service, and writes `ResponseEnvelope`
//! lines to stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.
//!
//! The config file is read from `TRADESCOUT_CONFIG` when set, otherwise
//! from the default config path. A missing file means defaults.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tradescout::AppConfig;
use tradescout::host::channel::CommandHandler;
use tradescout::host::handler::ServiceHandler;
use tradescout::host::stdio::run_stdio_bridge;

const CONFIG_PATH_ENV: &str = "TRADESCOUT_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(AppConfig::default_config_path);
    let mut config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    config.apply_env();

    // Initialise tracing to stderr only (stdout is reserved for the JSON
    // protocol).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.host.log_filter)),
        )
        .init();

    tracing::info!(config = %config_path.display(), "tradescout-host starting");

    let handler = ServiceHandler::from_config(&config)
        .await
        .context("failed to start search service")?;
    let handler = Arc::new(handler);

    let result = run_stdio_bridge(Arc::clone(&handler)).await;

    // Sessions close here too when input ended without runtime.stop.
    handler.stop().await.context("failed to stop search service")?;

    result.map_err(|e| {
        tracing::error!(error = %e, "tradescout-host exited with error");
        anyhow::anyhow!("tradescout-host failed: {e}")
    })?;

    tracing::info!("tradescout-host shut down cleanly");
    Ok(())
}
