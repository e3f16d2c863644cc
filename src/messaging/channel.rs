use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info};

/// Opaque named-channel transport supplied by the host integration.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Deliver `payload` on `channel` towards the process serving `player`.
    async fn send(&self, channel: &str, player: &str, payload: Bytes) -> Result<()>;
}

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Subjects are `<subject_prefix>.<channel>`
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string())
}

fn default_subject_prefix() -> String {
    "skinrelay".to_string()
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

/// Message channel carried over NATS core pub/sub.
///
/// Every worker subscribes to the channel subject; a worker that does not
/// host the target player drops the frame.
#[derive(Clone)]
pub struct NatsChannel {
    client: async_nats::Client,
    config: NatsConfig,
}

impl NatsChannel {
    /// Connect to NATS
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        Ok(Self { client, config })
    }

    /// Subject used for `channel`.
    pub fn subject(&self, channel: &str) -> String {
        format!("{}.{}", self.config.subject_prefix, channel)
    }

    /// Subscribe to frames sent on `channel`.
    pub async fn subscribe(&self, channel: &str) -> Result<async_nats::Subscriber> {
        let subject = self.subject(channel);
        info!("Subscribing to '{}'", subject);

        self.client
            .subscribe(subject.clone())
            .await
            .context(format!("Failed to subscribe to subject '{}'", subject))
    }

    /// Get underlying NATS client
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}

#[async_trait]
impl MessageChannel for NatsChannel {
    async fn send(&self, channel: &str, player: &str, payload: Bytes) -> Result<()> {
        let subject = self.subject(channel);

        debug!(
            subject = %subject,
            player = %player,
            bytes = payload.len(),
            "Publishing frame to NATS"
        );

        self.client
            .publish(subject.clone(), payload)
            .await
            .context(format!("Failed to publish frame to subject '{}'", subject))?;

        Ok(())
    }
}
