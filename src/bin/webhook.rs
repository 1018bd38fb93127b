//! Webhook front end.
//!
//! Runs the same bot as the polling binary, but serves `/telegram` and lets
//! Telegram push updates. `PUT /telegram?token=...` registers the webhook.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ofensivaria::bot::Bot;
use ofensivaria::config::Config;
use ofensivaria::webhook;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ofensivaria=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if config.webhook.public_url.is_empty() {
        warn!("webhook.public_url is not set; PUT /telegram will register an unusable url");
    }
    if config.webhook.debug {
        warn!("Webhook debug mode: requests are not checked for the bot token");
    }

    let bot = Bot::new(config).setup().await?;

    webhook::serve(&bot, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Closing");
    })
    .await?;

    bot.shutdown().await?;
    Ok(())
}
