//! Markdown transcripts.
//!
//! A transcript is a `# {topic}` title followed by one block per message:
//!
//! ```text
//! <!-- agentroom {"id":4,"kind":"chat","agent":"Nova","color":"cyan","timestamp":"..."} -->
//! **Nova**: I think trams are underrated.
//!
//! ```
//!
//! The marker comment carries everything except the content, so the file reads
//! naturally as markdown while still parsing back into the exact message ids
//! and kinds. [`Transcript::active_roster`] replays join and leave events to
//! recover who was in the room when the file was last written.
//!
//! Content is written verbatim except for lines that would read as a marker,
//! which gain one leading backslash; parsing removes it again.

use crate::error::TranscriptError;
use crate::event::{RoomEvent, RoomEventHandler};
use crate::message::{MessageKind, RoomMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const MARKER_OPEN: &str = "<!-- agentroom ";
const MARKER_CLOSE: &str = " -->";
const ESCAPE: char = '\\';

fn looks_like_marker(line: &str) -> bool {
    line.trim_start_matches(ESCAPE).starts_with(MARKER_OPEN)
}

fn escape_line(line: &str) -> Cow<'_, str> {
    if looks_like_marker(line) {
        Cow::Owned(format!("{}{}", ESCAPE, line))
    } else {
        Cow::Borrowed(line)
    }
}

fn unescape_line(line: &str) -> &str {
    match line.strip_prefix(ESCAPE) {
        Some(rest) if looks_like_marker(rest) => rest,
        _ => line,
    }
}

#[derive(Serialize, Deserialize)]
struct Marker {
    #[serde(default)]
    id: Option<u64>,
    kind: MessageKind,
    agent: String,
    color: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

pub fn format_header(topic: &str) -> String {
    format!("# {}\n\n", topic)
}

/// Render one message as a transcript block, trailing blank line included.
pub fn format_message(message: &RoomMessage) -> String {
    let marker = Marker {
        id: message.id,
        kind: message.kind,
        agent: message.agent.clone(),
        color: message.color.clone(),
        timestamp: message.timestamp,
        provider: message.provider.clone(),
        model: message.model.clone(),
    };
    // Plain values only, so serialization cannot fail.
    let json = serde_json::to_string(&marker)
        .unwrap_or_default()
        .replace("-->", "--\\u003e");
    let content: Vec<Cow<'_, str>> = message.content.split('\n').map(escape_line).collect();
    format!(
        "{}{}{}\n**{}**: {}\n\n",
        MARKER_OPEN,
        json,
        MARKER_CLOSE,
        message.agent,
        content.join("\n")
    )
}

/// A parsed transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub topic: Option<String>,
    pub messages: Vec<RoomMessage>,
}

impl Transcript {
    /// Highest persisted id, where a resumed room continues from.
    pub fn last_id(&self) -> Option<u64> {
        self.messages.iter().filter_map(|m| m.id).max()
    }

    /// Replay join and leave events, returning the final active roster in
    /// seating order.
    pub fn active_roster(&self) -> Vec<String> {
        let mut roster: Vec<String> = Vec::new();
        for message in &self.messages {
            match message.kind {
                MessageKind::Join => {
                    if !roster.contains(&message.agent) {
                        roster.push(message.agent.clone());
                    }
                }
                MessageKind::Leave => roster.retain(|name| name != &message.agent),
                _ => {}
            }
        }
        roster
    }
}

struct Pending {
    line: usize,
    marker: Marker,
    body: Vec<String>,
}

impl Pending {
    fn finish(self) -> Result<RoomMessage, TranscriptError> {
        let mut body = self.body;
        // Drop the blank line that separates blocks; anything before it is content.
        if body.last().is_some_and(|l| l.is_empty()) {
            body.pop();
        }
        let text = body.join("\n");
        let prefix = format!("**{}**:", self.marker.agent);
        let content = text
            .strip_prefix(&prefix)
            .ok_or_else(|| TranscriptError::Malformed {
                line: self.line + 1,
                reason: format!("expected body starting with {}", prefix),
            })?;
        let content = content.strip_prefix(' ').unwrap_or(content);
        let content: Vec<&str> = content.split('\n').map(unescape_line).collect();

        Ok(RoomMessage {
            id: self.marker.id,
            timestamp: self.marker.timestamp,
            agent: self.marker.agent,
            content: content.join("\n"),
            color: self.marker.color,
            kind: self.marker.kind,
            provider: self.marker.provider,
            model: self.marker.model,
        })
    }
}

/// Parse a transcript produced by [`format_header`] and [`format_message`].
///
/// Lines before the first marker other than the title are ignored.
pub fn parse_transcript(raw: &str) -> Result<Transcript, TranscriptError> {
    let mut transcript = Transcript::default();
    let mut pending: Option<Pending> = None;

    for (index, line) in raw.lines().enumerate() {
        let line_no = index + 1;
        if let Some(rest) = line.strip_prefix(MARKER_OPEN) {
            let json = rest
                .strip_suffix(MARKER_CLOSE)
                .ok_or_else(|| TranscriptError::Malformed {
                    line: line_no,
                    reason: "unterminated marker".to_string(),
                })?;
            let marker: Marker =
                serde_json::from_str(json).map_err(|err| TranscriptError::Malformed {
                    line: line_no,
                    reason: err.to_string(),
                })?;
            if let Some(done) = pending.take() {
                transcript.messages.push(done.finish()?);
            }
            pending = Some(Pending {
                line: line_no,
                marker,
                body: Vec::new(),
            });
            continue;
        }

        match pending.as_mut() {
            Some(current) => current.body.push(line.to_string()),
            None => {
                if transcript.topic.is_none() {
                    if let Some(topic) = line.strip_prefix("# ") {
                        transcript.topic = Some(topic.trim().to_string());
                    }
                }
            }
        }
    }

    if let Some(done) = pending.take() {
        transcript.messages.push(done.finish()?);
    }
    Ok(transcript)
}

pub fn load_transcript(path: impl AsRef<Path>) -> Result<Transcript, TranscriptError> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let transcript = parse_transcript(&raw)?;
    log::info!(
        "agentroom::transcript::load_transcript(...): {} messages from {}",
        transcript.messages.len(),
        path.as_ref().display()
    );
    Ok(transcript)
}

/// Appends every message event to a markdown file.
pub struct TranscriptWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl TranscriptWriter {
    /// Start a new transcript at `path`, truncating any existing file.
    pub async fn create(path: impl AsRef<Path>, topic: &str) -> Result<Self, TranscriptError> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path).await?;
        file.write_all(format_header(topic).as_bytes()).await?;
        file.flush().await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Continue an existing transcript.
    pub async fn append(path: impl AsRef<Path>) -> Result<Self, TranscriptError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().append(true).open(&path).await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write_message(&self, message: &RoomMessage) -> Result<(), TranscriptError> {
        let block = format_message(message);
        let mut file = self.file.lock().await;
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl RoomEventHandler for TranscriptWriter {
    async fn on_event(&self, event: &RoomEvent) {
        if let RoomEvent::Message(message) = event {
            if let Err(err) = self.write_message(message).await {
                log::error!(
                    "agentroom::transcript::on_event(...): failed to append to {}: {}",
                    self.path.display(),
                    err
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_round_trip() {
        let msg = RoomMessage::new("Nova", "Trams are underrated.", "cyan", MessageKind::Chat).with_id(4);
        let raw = format!("{}{}", format_header("Cities"), format_message(&msg));
        let parsed = parse_transcript(&raw).unwrap();
        assert_eq!(parsed.topic.as_deref(), Some("Cities"));
        assert_eq!(parsed.messages, vec![msg]);
    }

    #[test]
    fn test_multiline_content_survives() {
        let msg = RoomMessage::user("line one\n\nline three").with_id(1);
        let parsed = parse_transcript(&format_message(&msg)).unwrap();
        assert_eq!(parsed.messages[0].content, "line one\n\nline three");
    }

    #[test]
    fn test_trailing_newlines_in_content_survive() {
        let messages = vec![
            RoomMessage::user("x\n").with_id(1),
            RoomMessage::user("y\n\n\n").with_id(2),
            RoomMessage::user("").with_id(3),
        ];
        let raw: String = messages.iter().map(format_message).collect();
        let parsed = parse_transcript(&raw).unwrap();
        assert_eq!(parsed.messages, messages);
    }

    #[test]
    fn test_marker_lookalike_lines_are_escaped() {
        assert_eq!(escape_line("<!-- agentroom {} -->"), "\\<!-- agentroom {} -->");
        assert_eq!(escape_line("\\<!-- agentroom x"), "\\\\<!-- agentroom x");
        assert_eq!(escape_line("\\not a marker"), "\\not a marker");
        for line in ["<!-- agentroom x", "\\<!-- agentroom x", "\\plain", "plain"] {
            assert_eq!(unescape_line(&escape_line(line)), line);
        }
    }

    #[test]
    fn test_body_must_match_agent() {
        let raw = format_message(&RoomMessage::system("x").with_id(0)).replace("**SYSTEM**", "**Bob**");
        assert!(matches!(
            parse_transcript(&raw),
            Err(TranscriptError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_active_roster_replays_membership() {
        let transcript = Transcript {
            topic: None,
            messages: vec![
                RoomMessage::new("A", "t", "c", MessageKind::Join).with_id(1),
                RoomMessage::new("B", "t", "c", MessageKind::Join).with_id(2),
                RoomMessage::new("A", "bye", "c", MessageKind::Leave).with_id(3),
                RoomMessage::new("C", "t", "c", MessageKind::Join).with_id(4),
            ],
        };
        assert_eq!(transcript.active_roster(), vec!["B", "C"]);
        assert_eq!(transcript.last_id(), Some(4));
    }
}
