mod alert;
mod config;
mod filter;
mod monitor;
mod platform;
mod watcher;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::WatchConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keywatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = WatchConfig::from_env().context("Failed to load configuration")?;

    let watched: Vec<String> = config.watched.iter().map(|c| c.to_string()).collect();
    let keywords: Vec<&str> = config.keywords.iter().collect();
    info!("Configuration loaded successfully");
    info!("  API ID: {}", config.credentials.api_id);
    info!("  Watched chats: {}", watched.join(", "));
    info!("  Keywords ({}): {}", config.keywords.len(), keywords.join(", "));
    if config.keywords.is_empty() {
        warn!("No keywords configured, no message will match");
    }
    info!("  Alert destination: {}", config.destination);
    info!(
        "  Alert identity: {}",
        if config.uses_bot() { "bot" } else { "listener" }
    );

    monitor::run(config).await
}
