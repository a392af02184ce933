//! Error types for room construction, loading and persistence.
//!
//! Turn-level failures (provider errors, empty replies, cancellation) never
//! surface through these types: [`ChatRoom::step`](crate::room::ChatRoom::step)
//! turns them into diagnostic messages or swallows them. What remains here are
//! the errors that must stop a room from opening at all.

use std::error::Error;
use std::fmt;

/// Errors raised while building, resuming or driving a [`ChatRoom`](crate::room::ChatRoom).
///
/// # Examples
///
/// ```
/// use agentroom::RoomError;
///
/// let err = RoomError::DuplicateAgent("Nova".into());
/// assert_eq!(err.to_string(), "Duplicate agent name: Nova");
/// ```
#[derive(Debug)]
pub enum RoomError {
    /// A [`RoomConfig`](crate::config::RoomConfig) field is out of range.
    InvalidConfig(String),
    /// The agent population is empty.
    EmptyRoster,
    /// Two agents share the same display name.
    DuplicateAgent(String),
    /// An agent references a provider kind missing from the registry.
    UnknownProvider {
        /// Name of the agent carrying the bad reference.
        agent: String,
        /// The provider kind that could not be resolved.
        provider: String,
    },
    /// A name (preferred roster entry, forced speaker) matches no known agent.
    UnknownAgent(String),
    /// The operation is not allowed in the room's current lifecycle state.
    InvalidState(String),
    /// Reading a roster, config or transcript file failed.
    Io(std::io::Error),
    /// A roster or config file could not be decoded.
    Parse(String),
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomError::InvalidConfig(msg) => write!(f, "Invalid room config: {}", msg),
            RoomError::EmptyRoster => write!(f, "Room has no agents"),
            RoomError::DuplicateAgent(name) => write!(f, "Duplicate agent name: {}", name),
            RoomError::UnknownProvider { agent, provider } => write!(
                f,
                "Agent {} references unknown provider '{}'",
                agent, provider
            ),
            RoomError::UnknownAgent(name) => write!(f, "Unknown agent: {}", name),
            RoomError::InvalidState(msg) => write!(f, "Invalid room state: {}", msg),
            RoomError::Io(err) => write!(f, "I/O error: {}", err),
            RoomError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl Error for RoomError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RoomError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RoomError {
    fn from(err: std::io::Error) -> Self {
        RoomError::Io(err)
    }
}

impl From<serde_json::Error> for RoomError {
    fn from(err: serde_json::Error) -> Self {
        RoomError::Parse(err.to_string())
    }
}

/// Errors raised while reading or writing a markdown transcript.
#[derive(Debug)]
pub enum TranscriptError {
    /// The underlying file could not be read or written.
    Io(std::io::Error),
    /// A marker line could not be decoded.
    Malformed {
        /// 1-based line number of the offending marker.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },
}

impl fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptError::Io(err) => write!(f, "Transcript I/O error: {}", err),
            TranscriptError::Malformed { line, reason } => {
                write!(f, "Malformed transcript at line {}: {}", line, reason)
            }
        }
    }
}

impl Error for TranscriptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TranscriptError::Io(err) => Some(err),
            TranscriptError::Malformed { .. } => None,
        }
    }
}

impl From<std::io::Error> for TranscriptError {
    fn from(err: std::io::Error) -> Self {
        TranscriptError::Io(err)
    }
}

impl From<TranscriptError> for RoomError {
    fn from(err: TranscriptError) -> Self {
        match err {
            TranscriptError::Io(err) => RoomError::Io(err),
            other => RoomError::Parse(other.to_string()),
        }
    }
}
