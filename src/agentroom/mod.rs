// src/agentroom/mod.rs

pub mod churn;
pub mod clients;
pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod personality;
pub mod phrases;
pub mod prompt;
pub mod provider;
pub mod random;
pub mod room;
pub mod roster;
pub mod scheduler;
pub mod sequencer;
pub mod transcript;

// Export ChatRoom so callers can write agentroom::ChatRoom instead of agentroom::room::ChatRoom.
pub use room::ChatRoom;
