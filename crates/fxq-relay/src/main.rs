//! FX quote relay - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// FX quote relay
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FXQ_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection is made
    fxq_ws::init_crypto();

    let args = Args::parse();

    fxq_telemetry::init_logging()?;

    info!("Starting fxq-relay v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > FXQ_CONFIG > default
    let config_path = args
        .config
        .or_else(|| std::env::var("FXQ_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = fxq_relay::AppConfig::load(&config_path)?;
    info!(
        feed_url = %config.feed.url,
        listen = %config.server.listen_addr(),
        "Configuration loaded"
    );

    let app = fxq_relay::Application::new(config)?;
    app.run().await?;

    Ok(())
}
