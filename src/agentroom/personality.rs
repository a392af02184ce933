//! Agent identities: who the agents are and which endpoint answers for them.
//!
//! A [`Personality`] is the immutable descriptive half of an agent, an
//! [`AgentConfig`] binds it to a completion endpoint and an optional priority.
//! Both are loaded once per room (usually from a JSON roster file via
//! [`load_roster`]) and never mutated afterwards.
//!
//! # Example
//!
//! ```
//! use agentroom::personality::{AgentConfig, Personality, ProviderRef};
//!
//! let nova = AgentConfig::new(
//!     Personality::new("Nova", "Urbanist with a soft spot for trams").with_chattiness(0.7),
//!     ProviderRef::new("openai", "gpt-4.1-mini"),
//! )
//! .with_priority(1);
//!
//! assert_eq!(nova.name(), "Nova");
//! assert!(nova.is_priority());
//! ```

use crate::error::RoomError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Descriptive record for a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    /// Display name, unique within a room's population.
    pub name: String,
    /// One-line self description, used as the content of join messages.
    pub tagline: String,
    #[serde(default)]
    pub traits: Vec<String>,
    /// Style directives injected verbatim into the system prompt.
    #[serde(default)]
    pub style: Vec<String>,
    #[serde(default)]
    pub perspective: String,
    /// Baseline eagerness to speak, in `[0, 1]`.
    #[serde(default = "default_chattiness")]
    pub chattiness: f64,
    /// Tendency to disagree, in `[0, 1]`. Only used for prompt construction.
    #[serde(default)]
    pub contrarianism: f64,
}

fn default_chattiness() -> f64 {
    0.5
}

impl Personality {
    pub fn new(name: impl Into<String>, tagline: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tagline: tagline.into(),
            traits: Vec::new(),
            style: Vec::new(),
            perspective: String::new(),
            chattiness: default_chattiness(),
            contrarianism: 0.0,
        }
    }

    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits = traits.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_style<I, S>(mut self, style: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.style = style.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_perspective(mut self, perspective: impl Into<String>) -> Self {
        self.perspective = perspective.into();
        self
    }

    pub fn with_chattiness(mut self, chattiness: f64) -> Self {
        self.chattiness = chattiness;
        self
    }

    pub fn with_contrarianism(mut self, contrarianism: f64) -> Self {
        self.contrarianism = contrarianism;
        self
    }
}

/// Which completion endpoint answers for an agent.
///
/// `provider` is a key into the [`ProviderRegistry`](crate::provider::ProviderRegistry)
/// (e.g. `"openai"`, `"grok"`, `"ollama"`); `model` is passed through on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRef {
    pub provider: String,
    pub model: String,
    /// Per-agent sampling temperature, overriding the room default.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Per-agent completion budget, overriding [`RoomConfig::max_tokens`](crate::config::RoomConfig::max_tokens).
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ProviderRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A [`Personality`] bound to an endpoint, plus its eviction priority.
///
/// Lower `priority` values rank higher. Agents without a priority are the only
/// ones churn may bench.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(flatten)]
    pub personality: Personality,
    pub endpoint: ProviderRef,
    #[serde(default)]
    pub priority: Option<u32>,
    /// Color tag copied onto every message this agent produces.
    #[serde(default)]
    pub color: Option<String>,
}

impl AgentConfig {
    pub fn new(personality: Personality, endpoint: ProviderRef) -> Self {
        Self {
            personality,
            endpoint,
            priority: None,
            color: None,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// The agent's identity within a room.
    pub fn name(&self) -> &str {
        &self.personality.name
    }

    pub fn is_priority(&self) -> bool {
        self.priority.is_some()
    }
}

/// Palette handed out to agents that do not pick their own color.
const PALETTE: [&str; 8] = [
    "cyan", "magenta", "yellow", "green", "blue", "red", "bright_cyan", "bright_magenta",
];

/// Color for the agent at `index` in the population, honoring an explicit choice.
pub fn color_for(agent: &AgentConfig, index: usize) -> String {
    agent
        .color
        .clone()
        .unwrap_or_else(|| PALETTE[index % PALETTE.len()].to_string())
}

/// Checks the invariants a population must satisfy before a room may open:
/// non-empty, unique names, probabilities inside `[0, 1]`.
pub fn validate_population(agents: &[AgentConfig]) -> Result<(), RoomError> {
    if agents.is_empty() {
        return Err(RoomError::EmptyRoster);
    }

    let mut seen = HashSet::new();
    for agent in agents {
        let name = agent.name();
        if name.trim().is_empty() {
            return Err(RoomError::InvalidConfig(
                "agent name must not be empty".to_string(),
            ));
        }
        if name == crate::message::SYSTEM_NAME || name == crate::message::USER_NAME {
            return Err(RoomError::InvalidConfig(format!(
                "agent name '{}' is reserved",
                name
            )));
        }
        if !seen.insert(name.to_string()) {
            return Err(RoomError::DuplicateAgent(name.to_string()));
        }
        ensure_unit_interval(name, "chattiness", agent.personality.chattiness)?;
        ensure_unit_interval(name, "contrarianism", agent.personality.contrarianism)?;
    }
    Ok(())
}

fn ensure_unit_interval(agent: &str, field: &str, value: f64) -> Result<(), RoomError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RoomError::InvalidConfig(format!(
            "{} of agent {} must be within [0, 1], got {}",
            field, agent, value
        )))
    }
}

#[derive(Deserialize)]
struct RosterFile {
    agents: Vec<AgentConfig>,
}

/// Load and validate a roster file of the form `{ "agents": [ ... ] }`.
pub fn load_roster(path: impl AsRef<Path>) -> Result<Vec<AgentConfig>, RoomError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let roster = parse_roster(&raw)?;
    log::info!(
        "agentroom::personality::load_roster(...): loaded {} agents from {}",
        roster.len(),
        path.as_ref().display()
    );
    Ok(roster)
}

/// Decode and validate a roster from its JSON text.
pub fn parse_roster(raw: &str) -> Result<Vec<AgentConfig>, RoomError> {
    let file: RosterFile = serde_json::from_str(raw)?;
    validate_population(&file.agents)?;
    Ok(file.agents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> AgentConfig {
        AgentConfig::new(
            Personality::new(name, "tagline"),
            ProviderRef::new("mock", "m"),
        )
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = validate_population(&[agent("Ada"), agent("Ada")]).unwrap_err();
        assert!(matches!(err, RoomError::DuplicateAgent(name) if name == "Ada"));
    }

    #[test]
    fn test_reserved_name_rejected() {
        let err = validate_population(&[agent("YOU")]).unwrap_err();
        assert!(matches!(err, RoomError::InvalidConfig(_)));
    }

    #[test]
    fn test_chattiness_out_of_range_rejected() {
        let mut loud = agent("Loud");
        loud.personality.chattiness = 1.5;
        assert!(validate_population(&[loud]).is_err());
    }

    #[test]
    fn test_parse_roster_with_defaults() {
        let raw = r#"{
            "agents": [
                {
                    "name": "Nova",
                    "tagline": "Urbanist",
                    "endpoint": { "provider": "openai", "model": "gpt-4.1-mini" },
                    "priority": 1
                },
                {
                    "name": "Rook",
                    "tagline": "Skeptic",
                    "traits": ["dry"],
                    "chattiness": 0.2,
                    "endpoint": { "provider": "ollama", "model": "llama3", "temperature": 0.4 }
                }
            ]
        }"#;

        let roster = parse_roster(raw).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].priority, Some(1));
        assert_eq!(roster[0].personality.chattiness, 0.5);
        assert_eq!(roster[1].endpoint.temperature, Some(0.4));
        assert_eq!(roster[1].personality.traits, vec!["dry".to_string()]);
    }

    #[test]
    fn test_color_falls_back_to_palette() {
        let a = agent("A");
        let b = agent("B").with_color("orange");
        assert_eq!(color_for(&a, 0), "cyan");
        assert_eq!(color_for(&a, 9), "magenta");
        assert_eq!(color_for(&b, 0), "orange");
    }
}
