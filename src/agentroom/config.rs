//! Room tuning parameters.
//!
//! [`RoomConfig`] is a plain struct: construct it directly, start from
//! [`RoomConfig::default`], or load it from a JSON file where every field is
//! optional.
//!
//! # Example
//!
//! ```rust
//! use agentroom::RoomConfig;
//!
//! let config = RoomConfig {
//!     topic: "Should cities ban cars?".to_string(),
//!     min_agents: 3,
//!     max_agents: 4,
//!     ..RoomConfig::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::error::RoomError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tuning parameters for a single room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub topic: String,
    /// Language every agent is asked to speak.
    pub language: String,
    /// Maximum number of history messages sent with each completion.
    pub context_window: usize,
    pub max_tokens: u32,
    /// Default sampling temperature when an agent has no override.
    pub temperature: f32,
    /// Base delay callers insert between turns in auto-paced mode.
    pub base_turn_delay_ms: u64,
    /// Lower bound on the active roster.
    pub min_agents: usize,
    /// Upper bound on the active roster.
    pub max_agents: usize,
    /// Churn is evaluated on every turn that is a multiple of this value.
    pub churn_interval_turns: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            topic: "The future of cities".to_string(),
            language: "English".to_string(),
            context_window: 20,
            max_tokens: 300,
            temperature: 0.9,
            base_turn_delay_ms: 4_000,
            min_agents: 2,
            max_agents: 5,
            churn_interval_turns: 3,
        }
    }
}

/// The roster bounds churn must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChurnBounds {
    pub min_agents: usize,
    pub max_agents: usize,
}

impl RoomConfig {
    /// Load a config from a JSON file, filling missing fields with defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RoomError> {
        let raw = std::fs::read_to_string(path)?;
        let config: RoomConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations under which the roster invariants cannot hold.
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.min_agents == 0 {
            return Err(RoomError::InvalidConfig(
                "min_agents must be at least 1".to_string(),
            ));
        }
        if self.min_agents > self.max_agents {
            return Err(RoomError::InvalidConfig(format!(
                "min_agents ({}) exceeds max_agents ({})",
                self.min_agents, self.max_agents
            )));
        }
        if self.context_window == 0 {
            return Err(RoomError::InvalidConfig(
                "context_window must be positive".to_string(),
            ));
        }
        if self.churn_interval_turns == 0 {
            return Err(RoomError::InvalidConfig(
                "churn_interval_turns must be positive".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(RoomError::InvalidConfig(
                "max_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bounds(&self) -> ChurnBounds {
        ChurnBounds {
            min_agents: self.min_agents,
            max_agents: self.max_agents,
        }
    }

    pub fn base_turn_delay(&self) -> Duration {
        Duration::from_millis(self.base_turn_delay_ms)
    }
}
