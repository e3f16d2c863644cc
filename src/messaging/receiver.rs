use super::frame::{Frame, Instruction};
use crate::identity::{IdentityAccessor, PlayerHandle};
use crate::property::PropertyRecord;
use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Players online on this process.
pub trait PlayerDirectory: Send + Sync {
    fn find(&self, name: &str) -> Option<Arc<dyn PlayerHandle>>;
}

/// What happened to a received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Applied { player: String },
    /// Target player is not on this process
    PlayerNotFound { player: String },
    /// Tag not recognized; frame dropped
    Ignored { tag: String },
}

/// Worker-side handler for frames arriving on the message channel.
///
/// A GiveSkull value arrives without signature, so it is applied as an
/// unsigned textures record through this process's accessor.
pub struct SkullReceiver {
    accessor: Arc<IdentityAccessor>,
    directory: Arc<dyn PlayerDirectory>,
}

impl SkullReceiver {
    pub fn new(accessor: Arc<IdentityAccessor>, directory: Arc<dyn PlayerDirectory>) -> Self {
        Self { accessor, directory }
    }

    pub fn handle(&self, payload: &[u8]) -> Result<Delivery> {
        let frame = Frame::decode(payload).context("Failed to decode frame")?;

        match Instruction::from(frame) {
            Instruction::GiveSkull { player, value } => {
                let Some(handle) = self.directory.find(&player) else {
                    debug!(player = %player, "GiveSkull target not on this process");
                    return Ok(Delivery::PlayerNotFound { player });
                };

                self.accessor
                    .apply_property(handle.as_ref(), &PropertyRecord::textures(value, None))
                    .context(format!("Failed to apply skull for '{}'", player))?;

                Ok(Delivery::Applied { player })
            }
            Instruction::Unknown { tag } => {
                debug!(tag = %tag, "Ignoring frame with unknown tag");
                Ok(Delivery::Ignored { tag })
            }
        }
    }

    /// Handle frames until the subscription closes.
    pub async fn run(self, mut subscriber: async_nats::Subscriber) {
        info!("Skull receiver started");

        while let Some(message) = subscriber.next().await {
            match self.handle(&message.payload) {
                Ok(Delivery::Applied { player }) => info!(player = %player, "Applied skull"),
                Ok(_) => {}
                Err(e) => warn!("Failed to handle frame: {:#}", e),
            }
        }

        info!("Skull receiver stopped");
    }
}
