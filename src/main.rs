use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ofensivaria::bot::Bot;
use ofensivaria::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ofensivaria=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Username: @{}", config.telegram.username);
    info!("  Database: {}", config.storage.database_path.display());
    info!("  Poll interval: {:?}", config.polling.interval());

    let bot = Bot::new(config).setup().await?;

    // Ctrl-C flips the flag; the poll loop checks it between batches
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Closing"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    info!("Bot is starting...");
    let result = bot.poll(shutdown_rx).await;
    if let Err(e) = bot.shutdown().await {
        error!("Shutdown failed: {:#}", e);
    }

    result
}
