use super::frame::Frame;
use super::channel::MessageChannel;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;

/// Sends GiveSkull frames to the process serving a player.
#[derive(Clone)]
pub struct CrossProcessMessenger {
    channel: Arc<dyn MessageChannel>,
    channel_name: String,
}

impl CrossProcessMessenger {
    pub fn new(channel: Arc<dyn MessageChannel>, channel_name: impl Into<String>) -> Self {
        Self {
            channel,
            channel_name: channel_name.into(),
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Ask the process serving `player` to give them a skull with `value`.
    ///
    /// The frame is fully encoded before anything is sent; an encoding
    /// failure sends nothing.
    pub async fn send_give_skull(&self, player: &str, value: &str) -> Result<()> {
        let payload = Frame::give_skull(player, value)
            .encode()
            .context(format!("Failed to encode GiveSkull frame for '{}'", player))?;

        debug!(
            channel = %self.channel_name,
            player = %player,
            bytes = payload.len(),
            "Sending GiveSkull frame"
        );

        self.channel.send(&self.channel_name, player, payload).await
    }
}
