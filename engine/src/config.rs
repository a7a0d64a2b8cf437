//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};

use parlay_types::UserId;

use crate::EngineError;

/// Configuration for a [`crate::WagerEngine`].
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum transaction attempts per transition, counting the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay before the first conflict retry.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Upper bound on any single retry delay.
    #[serde(default = "default_retry_cap_ms")]
    pub retry_cap_ms: u64,

    /// User ids allowed to settle and void wagers (platform service
    /// accounts; game-result callbacks arrive as one of these).
    #[serde(default)]
    pub settlement_authorities: Vec<String>,

    /// Capacity of the notifier broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_base_ms() -> u64 {
    10
}

fn default_retry_cap_ms() -> u64 {
    250
}

fn default_event_capacity() -> usize {
    256
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("cannot read {path}: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        toml::from_str(s).map_err(|e| config_error(e.to_string()))
    }

    /// Whether `user` may settle or void wagers.
    pub fn is_settlement_authority(&self, user: &UserId) -> bool {
        self.settlement_authorities
            .iter()
            .any(|a| a == user.as_str())
    }

    /// Convenience for tests and bootstrap code.
    pub fn with_authority(mut self, user: &str) -> Self {
        self.settlement_authorities.push(user.to_string());
        self
    }
}

fn config_error(message: String) -> EngineError {
    EngineError::Config(message)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_base_ms: default_retry_base_ms(),
            retry_cap_ms: default_retry_cap_ms(),
            settlement_authorities: Vec::new(),
            event_capacity: default_event_capacity(),
        }
    }
}
