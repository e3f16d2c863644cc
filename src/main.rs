use anyhow::{anyhow, Context, Result};
use skinrelay::config::{load_config, RelayConfig};
use skinrelay::identity::memory::{HostBuild, MemoryDirectory, MemoryPlayer};
use skinrelay::identity::IdentityAccessor;
use skinrelay::messaging::{NatsChannel, SkullReceiver};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skinrelay=info".into()),
        )
        .init();

    info!("skinrelay worker starting...");

    let config = match std::env::var("SKINRELAY_CONFIG") {
        Ok(path) => load_config(&path)
            .map_err(|e| anyhow!("{}", e))
            .context(format!("Failed to load config from '{}'", path))?,
        Err(_) => RelayConfig::default(),
    };

    info!(
        channel = %config.messaging.channel,
        nats_url = %config.nats.url,
        "Configuration loaded"
    );

    // Players hosted by this worker
    let directory = Arc::new(MemoryDirectory::new());
    if let Ok(players) = std::env::var("SKINRELAY_PLAYERS") {
        for name in players.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            directory.join(MemoryPlayer::new(name, HostBuild::Modern));
        }
    }

    let channel = NatsChannel::connect(config.nats.clone()).await?;
    let subscriber = channel.subscribe(&config.messaging.channel).await?;

    let receiver = SkullReceiver::new(Arc::new(IdentityAccessor::new()), directory);
    let receiver_handle = tokio::spawn(receiver.run(subscriber));

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    receiver_handle.abort();
    info!("skinrelay worker stopped");

    Ok(())
}
