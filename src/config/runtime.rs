use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Settings that can change while the process runs. Read on every request,
/// so a toggle takes effect without restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Disables every outbound HTTP connection
    pub no_connections: bool,
    pub max_response_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            no_connections: false,
            max_response_bytes: 4_194_304, // 4 MB
        }
    }
}

impl RuntimeConfig {
    /// Build from env vars, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SKINRELAY_NO_CONNECTIONS") {
            if let Ok(b) = v.parse::<bool>() {
                cfg.no_connections = b;
            }
        }
        if let Ok(v) = std::env::var("SKINRELAY_MAX_RESPONSE_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.max_response_bytes = n;
            }
        }

        cfg
    }
}

pub type SharedRuntimeConfig = Arc<RwLock<RuntimeConfig>>;

pub fn new_runtime_config() -> SharedRuntimeConfig {
    Arc::new(RwLock::new(RuntimeConfig::from_env()))
}
