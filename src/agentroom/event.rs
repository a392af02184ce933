//! Room event system.
//!
//! A [`ChatRoom`](crate::room::ChatRoom) reports everything it does through a
//! single [`RoomEventHandler`]:
//!
//! - **Messages**: every finalized [`RoomMessage`], in emission order. This is
//!   the only authoritative channel.
//! - **Thinking**: a turn's completion request has started, with the id its
//!   message will carry.
//! - **Stream tokens / done**: live text for presentation only.
//!
//! The handler has a default no-op implementation, so a presentation layer can
//! ignore what it does not render. Wrap several handlers in a
//! [`FanoutHandler`] to feed a terminal printer and a transcript writer at once.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentroom::event::{RoomEvent, RoomEventHandler};
//! use async_trait::async_trait;
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl RoomEventHandler for Printer {
//!     async fn on_event(&self, event: &RoomEvent) {
//!         match event {
//!             RoomEvent::Message(msg) => println!("{}: {}", msg.agent, msg.content),
//!             RoomEvent::Thinking { agent, .. } => println!("{} is thinking...", agent),
//!             _ => {}
//!         }
//!     }
//! }
//! ```

use crate::message::RoomMessage;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;

/// Everything a room reports to its observers.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// A message was appended to history.
    Message(RoomMessage),
    /// `agent` started generating the message that will carry `message_id`.
    Thinking { agent: String, message_id: u64 },
    /// Incremental text from `agent`'s in-flight completion.
    StreamToken { agent: String, chunk: String },
    /// `agent`'s completion stream finished.
    StreamDone { agent: String },
}

impl RoomEvent {
    /// The agent the event is about, if any.
    pub fn agent(&self) -> &str {
        match self {
            RoomEvent::Message(msg) => &msg.agent,
            RoomEvent::Thinking { agent, .. }
            | RoomEvent::StreamToken { agent, .. }
            | RoomEvent::StreamDone { agent } => agent,
        }
    }
}

#[async_trait]
pub trait RoomEventHandler: Send + Sync {
    async fn on_event(&self, _event: &RoomEvent) {}
}

/// Forwards every event to each wrapped handler.
#[derive(Clone, Default)]
pub struct FanoutHandler {
    handlers: Vec<Arc<dyn RoomEventHandler>>,
}

impl FanoutHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn RoomEventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl RoomEventHandler for FanoutHandler {
    async fn on_event(&self, event: &RoomEvent) {
        // Concurrent per event; each handler still sees events in emission order.
        join_all(self.handlers.iter().map(|handler| handler.on_event(event))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RoomEventHandler for Recorder {
        async fn on_event(&self, event: &RoomEvent) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.tag, event.agent()));
        }
    }

    #[tokio::test]
    async fn test_fanout_preserves_handler_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fanout = FanoutHandler::new()
            .with_handler(Arc::new(Recorder { tag: "a", log: log.clone() }))
            .with_handler(Arc::new(Recorder { tag: "b", log: log.clone() }));

        fanout
            .on_event(&RoomEvent::StreamDone { agent: "Nova".into() })
            .await;
        fanout
            .on_event(&RoomEvent::Message(RoomMessage::system("hi")))
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:Nova", "b:Nova", "a:SYSTEM", "b:SYSTEM"]
        );
    }
}
