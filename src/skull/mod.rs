// Router-side skull requests
//
// Own skull:  Requested → (cooldown) → RejectedCooldown | resolve skin name
//             → NoSkin | resolve skin data → NoData | Ready → Sent
// Give skull: resolve the value for a SkullSource, then send.

use crate::cooldown::CooldownGate;
use crate::messaging::CrossProcessMessenger;
use crate::mojang::MojangFetcher;
use crate::property::PropertyRecord;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};


/// Permission letting a player skip the cooldown.
pub const BYPASS_COOLDOWN_PERMISSION: &str = "skinrelay.bypasscooldown";

/// Player connected to the router.
pub trait ProxyPlayer: Send + Sync {
    fn name(&self) -> &str;

    fn has_permission(&self, permission: &str) -> bool;
}

/// Skin storage owned by the host integration.
#[async_trait]
pub trait SkinStorage: Send + Sync {
    /// Name of the skin chosen by `player`, if any.
    async fn skin_name_of_player(&self, player: &str) -> Result<Option<String>>;

    /// Stored property for the skin named `skin`.
    async fn skin_data(&self, skin: &str) -> Result<Option<PropertyRecord>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinVariant {
    Classic,
    Slim,
}

impl FromStr for SkinVariant {
    type Err = ParseSkullError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "classic" | "steve" => Ok(SkinVariant::Classic),
            "slim" | "alex" => Ok(SkinVariant::Slim),
            _ => Err(ParseSkullError::UnknownVariant(s.to_string())),
        }
    }
}

/// Command argument that names no known source or variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSkullError {
    UnknownSource(String),
    UnknownVariant(String),
}

impl fmt::Display for ParseSkullError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSkullError::UnknownSource(s) => write!(f, "unknown skull source '{}'", s),
            ParseSkullError::UnknownVariant(s) => write!(f, "unknown skin variant '{}'", s),
        }
    }
}

impl std::error::Error for ParseSkullError {}

impl From<ParseSkullError> for SkullOutcome {
    fn from(_: ParseSkullError) -> Self {
        SkullOutcome::InvalidSource
    }
}

/// Generates a signed skin from an image URL (e.g. through a skin-signing service).
#[async_trait]
pub trait SkinGenerator: Send + Sync {
    async fn generate(&self, url: &str, variant: SkinVariant) -> Result<PropertyRecord>;
}

/// Origin of the value given as a skull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkullSource {
    /// Current skin of a premium account
    MojangPlayer,
    /// Skin chosen by a player on this network
    Player,
    /// Stored skin by name
    Skin,
    /// Skin generated from an image URL
    SkinUrl,
    /// Raw texture value
    TextureValue,
}

impl FromStr for SkullSource {
    type Err = ParseSkullError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mojangplayer" => Ok(SkullSource::MojangPlayer),
            "player" => Ok(SkullSource::Player),
            "skin" => Ok(SkullSource::Skin),
            "skinurl" => Ok(SkullSource::SkinUrl),
            "texturevalue" => Ok(SkullSource::TextureValue),
            _ => Err(ParseSkullError::UnknownSource(s.to_string())),
        }
    }
}

/// Terminal state of a skull request. `Display` is the message shown to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkullOutcome {
    Sent,
    RejectedCooldown { remaining_seconds: u64 },
    NoSkin,
    NoData,
    InvalidSource,
    /// The source could not be reached; details are logged, not shown
    SourceUnavailable,
}

impl fmt::Display for SkullOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkullOutcome::Sent => write!(f, "Here you go, your skull!"),
            SkullOutcome::RejectedCooldown { remaining_seconds } => write!(
                f,
                "You can request another skull in {} seconds.",
                remaining_seconds
            ),
            SkullOutcome::NoSkin => write!(f, "You don't have a skin set."),
            SkullOutcome::NoData => write!(f, "No skin data found."),
            SkullOutcome::InvalidSource => write!(f, "Invalid skull source."),
            SkullOutcome::SourceUnavailable => write!(f, "Could not fetch that skin right now."),
        }
    }
}

/// Drives skull requests on the router.
pub struct SkullService {
    cooldown: Arc<CooldownGate>,
    storage: Arc<dyn SkinStorage>,
    messenger: CrossProcessMessenger,
    mojang: Option<MojangFetcher>,
    generator: Option<Arc<dyn SkinGenerator>>,
}

impl SkullService {
    pub fn new(cooldown: Arc<CooldownGate>, storage: Arc<dyn SkinStorage>, messenger: CrossProcessMessenger) -> Self {
        Self {
            cooldown,
            storage,
            messenger,
            mojang: None,
            generator: None,
        }
    }

    pub fn with_mojang(mut self, mojang: MojangFetcher) -> Self {
        self.mojang = Some(mojang);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn SkinGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Send `player` a skull of their own skin.
    ///
    /// The cooldown is granted at the check, before the skin lookups.
    pub async fn request_own_skull(&self, player: &dyn ProxyPlayer) -> Result<SkullOutcome> {
        let name = player.name();

        if !player.has_permission(BYPASS_COOLDOWN_PERMISSION) {
            if let Err(rejected) = self.cooldown.try_acquire(name) {
                debug!(player = %name, remaining = rejected.remaining_seconds, "Skull request on cooldown");
                return Ok(SkullOutcome::RejectedCooldown {
                    remaining_seconds: rejected.remaining_seconds,
                });
            }
        }

        let Some(skin) = self.storage.skin_name_of_player(name).await? else {
            return Ok(SkullOutcome::NoSkin);
        };

        let Some(data) = self.storage.skin_data(&skin).await? else {
            debug!(player = %name, skin = %skin, "No skin data");
            return Ok(SkullOutcome::NoData);
        };

        self.messenger.send_give_skull(name, data.value()).await?;
        Ok(SkullOutcome::Sent)
    }

    /// Give `target` a skull whose value comes from `source`.
    pub async fn give_skull(
        &self,
        target: &str,
        source: SkullSource,
        value: &str,
        variant: SkinVariant,
    ) -> Result<SkullOutcome> {
        let texture = match self.resolve(source, value, variant).await {
            Ok(Some(texture)) => texture,
            Ok(None) => return Ok(SkullOutcome::NoData),
            Err(outcome) => return Ok(outcome),
        };

        self.messenger.send_give_skull(target, &texture).await?;
        Ok(SkullOutcome::Sent)
    }

    /// Texture value for `source`. Failures become the outcome reported to the sender.
    async fn resolve(
        &self,
        source: SkullSource,
        value: &str,
        variant: SkinVariant,
    ) -> Result<Option<String>, SkullOutcome> {
        let record = match source {
            SkullSource::TextureValue => return Ok(Some(value.to_string())),
            SkullSource::MojangPlayer => {
                let mojang = self.mojang.as_ref().ok_or(SkullOutcome::InvalidSource)?;
                mojang.fetch_profile(value).await
            }
            SkullSource::Player => match self.storage.skin_name_of_player(value).await {
                Ok(Some(skin)) => self.storage.skin_data(&skin).await,
                other => other.map(|_| None),
            },
            SkullSource::Skin => self.storage.skin_data(value).await,
            SkullSource::SkinUrl => {
                let generator = self.generator.as_ref().ok_or(SkullOutcome::InvalidSource)?;
                generator.generate(value, variant).await.map(Some)
            }
        };

        match record {
            Ok(record) => Ok(record.map(|r| r.value().to_string())),
            Err(e) => {
                warn!(source = ?source, value = %value, "Failed to resolve skull source: {:#}", e);
                Err(SkullOutcome::SourceUnavailable)
            }
        }
    }
}
