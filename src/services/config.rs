//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),
}

fn default_routing() -> String {
    "random".to_string()
}

fn default_tracker_capacity() -> usize {
    1024
}

/// Engine-level defaults. Per-task settings in a chain definition always
/// take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resolver policy used when a chain declares no routing strategy.
    pub default_routing: String,
    /// Seed applied to the random policy. Unset means entropy.
    pub resolver_seed: Option<u64>,
    /// Fallback per-attempt deadline in milliseconds for tasks without
    /// their own timeout. Unset means the caller's deadline alone applies.
    pub default_timeout_ms: Option<u64>,
    /// Broadcast capacity for the tracker bus.
    pub tracker_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_routing: default_routing(),
            resolver_seed: None,
            default_timeout_ms: None,
            tracker_capacity: default_tracker_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}
