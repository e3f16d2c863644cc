pub mod runtime;
pub use runtime::{new_runtime_config, RuntimeConfig, SharedRuntimeConfig};

use serde::Deserialize;
use std::time::Duration;

pub use crate::messaging::NatsConfig;
pub use crate::mojang::MojangConfig;

/// Complete skinrelay configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cooldown: CooldownConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub nats: NatsConfig,
    #[serde(default)]
    pub mojang: MojangConfig,
}

/// Outbound HTTP settings
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Connect and read timeout (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_user_agent() -> String {
    concat!("skinrelay/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_ms() -> u64 {
    crate::http::DEFAULT_TIMEOUT_MS
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Skin-change cooldown
#[derive(Debug, Clone, Deserialize)]
pub struct CooldownConfig {
    #[serde(default = "default_cooldown_seconds")]
    pub seconds: u64,
}

fn default_cooldown_seconds() -> u64 {
    30
}

impl CooldownConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            seconds: default_cooldown_seconds(),
        }
    }
}

/// Cross-process messaging
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// Named channel carrying GiveSkull frames
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    crate::messaging::CHANNEL.to_string()
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<RelayConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: RelayConfig = toml::from_str(&contents)?;
    Ok(config)
}
