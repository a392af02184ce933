//! # agentroom
//!
//! agentroom simulates a group conversation among language-model agents, with an optional
//! human host who can interject. Each agent has a personality (tagline, traits, style,
//! perspective, chattiness) and its own completion endpoint. The crate provides:
//!
//! * **Conversation engine**: [`ChatRoom`] owns the roster and the history, decides who
//!   speaks, requests one completion per turn and emits strictly ordered, uniquely
//!   identified messages.
//! * **Speaker scheduling**: the [`scheduler`] admits each agent with probability
//!   `chattiness + min(silence * 0.15, 0.4)` and never lets anyone speak twice in a row.
//! * **Membership churn**: the [`churn`] evaluator moves quiet agents out and benched
//!   agents in, keeping the active roster inside `[min_agents, max_agents]` and never
//!   evicting priority agents.
//! * **Providers**: the [`provider::CompletionProvider`] trait, implemented for every
//!   OpenAI-compatible backend (OpenAI, xAI Grok, Anthropic, Gemini, Ollama) in
//!   [`clients::openai`].
//! * **Persistence**: markdown [`transcript`]s that round-trip message ids and kinds and
//!   let a room resume where it left off.
//!
//! Pacing is the caller's job: the engine never polls or sleeps on its own. Step it
//! turn by turn in a governed loop, or auto-pace it with [`ChatRoom::pause`].
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use agentroom::provider::ProviderRegistry;
//! use agentroom::room::StepOptions;
//! use agentroom::{AgentConfig, ChatRoom, Personality, ProviderRef, RoomConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     agentroom::init_logger();
//!
//!     let agents = vec![
//!         AgentConfig::new(
//!             Personality::new("Nova", "Urbanist who loves trams").with_chattiness(0.7),
//!             ProviderRef::new("openai", "gpt-4.1-nano"),
//!         ),
//!         AgentConfig::new(
//!             Personality::new("Rex", "Suburban skeptic").with_contrarianism(0.8),
//!             ProviderRef::new("grok", "grok-3-mini"),
//!         ),
//!     ];
//!
//!     let mut room = ChatRoom::new(RoomConfig::default(), agents, &ProviderRegistry::from_env())?;
//!     room.open().await?;
//!     for _ in 0..6 {
//!         room.step(StepOptions::default()).await;
//!     }
//!     room.stop();
//!
//!     for msg in room.history() {
//!         println!("[{}] {}: {}", msg.kind, msg.agent, msg.content);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Library code only logs through the `log` facade; applications opt in to `RUST_LOG`
/// driven output by calling this.
///
/// ```rust
/// agentroom::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `agentroom` module.
pub mod agentroom;

// Re-exporting key items for easier external access.
pub use agentroom::churn;
pub use agentroom::clients;
pub use agentroom::config;
pub use agentroom::config::{ChurnBounds, RoomConfig};
pub use agentroom::error;
pub use agentroom::error::{RoomError, TranscriptError};
pub use agentroom::event;
pub use agentroom::event::{FanoutHandler, RoomEvent, RoomEventHandler};
pub use agentroom::message;
pub use agentroom::message::{MessageClass, MessageKind, RoomMessage};
pub use agentroom::personality;
pub use agentroom::personality::{load_roster, AgentConfig, Personality, ProviderRef};
pub use agentroom::phrases;
pub use agentroom::prompt;
pub use agentroom::provider;
pub use agentroom::provider::{CompletionProvider, ProviderError, ProviderRegistry};
pub use agentroom::random;
pub use agentroom::room;
pub use agentroom::room::{ChatRoom, StepOptions, StepOutcome, TurnResult};
pub use agentroom::roster;
pub use agentroom::scheduler;
pub use agentroom::sequencer;
pub use agentroom::transcript;
