//! The room's append-only log entries.
//!
//! Every [`RoomMessage`] carries an optional numeric id assigned once by the
//! [`MessageSequencer`](crate::sequencer::MessageSequencer). Ids are monotonic
//! in emission order and never reassigned, including when history is replayed
//! from a persisted transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved speaker name for narration and diagnostics.
pub const SYSTEM_NAME: &str = "SYSTEM";
/// Reserved speaker name for the human participant.
pub const USER_NAME: &str = "YOU";

pub const SYSTEM_COLOR: &str = "gray";
pub const USER_COLOR: &str = "white";

/// What a message represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    Join,
    Leave,
    System,
    User,
}

impl MessageKind {
    pub fn class(self) -> MessageClass {
        match self {
            MessageKind::Chat | MessageKind::User => MessageClass::Content,
            MessageKind::Join | MessageKind::Leave | MessageKind::System => MessageClass::Event,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::Join => "join",
            MessageKind::Leave => "leave",
            MessageKind::System => "system",
            MessageKind::User => "user",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content (substantive turns) versus event (membership and narration notices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageClass {
    Content,
    Event,
}

impl MessageClass {
    /// Single-letter flag appended to artifact keys.
    pub fn flag(self) -> char {
        match self {
            MessageClass::Content => 'c',
            MessageClass::Event => 'e',
        }
    }
}

/// One finalized entry in a room's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub id: Option<u64>,
    pub timestamp: DateTime<Utc>,
    /// Originating agent, or [`SYSTEM_NAME`] / [`USER_NAME`].
    pub agent: String,
    pub content: String,
    pub color: String,
    pub kind: MessageKind,
    /// Provider display label, set only on join messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model display label, set only on join messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RoomMessage {
    pub fn new(
        agent: impl Into<String>,
        content: impl Into<String>,
        color: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            agent: agent.into(),
            content: content.into(),
            color: color.into(),
            kind,
            provider: None,
            model: None,
        }
    }

    /// A narration or diagnostic line attributed to [`SYSTEM_NAME`].
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(SYSTEM_NAME, content, SYSTEM_COLOR, MessageKind::System)
    }

    /// A line typed by the human participant.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(USER_NAME, content, USER_COLOR, MessageKind::User)
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_labels(mut self, provider: impl Into<String>, model: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self.model = Some(model.into());
        self
    }

    pub fn class(&self) -> MessageClass {
        self.kind.class()
    }

    pub fn is_content(&self) -> bool {
        self.class() == MessageClass::Content
    }

    pub fn is_from_user(&self) -> bool {
        self.kind == MessageKind::User
    }

    /// Stable key for artifacts derived from this message (audio clips, frames).
    ///
    /// Encodes the id and its class so a consumer can tell content from events
    /// by key alone. `None` until the message has an id.
    ///
    /// ```
    /// use agentroom::message::RoomMessage;
    ///
    /// let msg = RoomMessage::system("Topic: trains").with_id(7);
    /// assert_eq!(msg.artifact_key().as_deref(), Some("000007-e"));
    /// ```
    pub fn artifact_key(&self) -> Option<String> {
        self.id.map(|id| artifact_key(id, self.class()))
    }
}

pub fn artifact_key(id: u64, class: MessageClass) -> String {
    format!("{:06}-{}", id, class.flag())
}
