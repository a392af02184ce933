//! The completion provider contract.
//!
//! A [`CompletionProvider`] turns a model id, an ordered prompt and sampling
//! limits into a reply. When the caller hands it a [`TokenSink`] it pushes zero
//! or more incremental chunks followed by a single `on_done` carrying the full
//! text. Providers must honor the room's cancellation token and report an
//! intentional stop as [`ProviderError::Cancelled`], never as a generic failure.
//!
//! # Example
//!
//! ```rust
//! use agentroom::provider::{CompletionProvider, CompletionRequest, ProviderError, TokenSink};
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Parrot;
//!
//! #[async_trait]
//! impl CompletionProvider for Parrot {
//!     fn name(&self) -> &str {
//!         "parrot"
//!     }
//!
//!     async fn complete(
//!         &self,
//!         request: CompletionRequest,
//!         sink: Option<&mut dyn TokenSink>,
//!         cancel: &CancellationToken,
//!     ) -> Result<String, ProviderError> {
//!         if cancel.is_cancelled() {
//!             return Err(ProviderError::Cancelled);
//!         }
//!         let reply = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
//!         if let Some(sink) = sink {
//!             sink.on_token(&reply).await;
//!             sink.on_done(&reply).await;
//!         }
//!         Ok(reply)
//!     }
//! }
//! ```

use crate::clients::openai::{OpenAICompatibleClient, Preset};
use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: ChatRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Everything a provider needs for one completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// Receiver for streamed text. Non-authoritative: only the final message
/// appended to room history counts.
#[async_trait]
pub trait TokenSink: Send {
    async fn on_token(&mut self, chunk: &str);
    async fn on_done(&mut self, full_text: &str);
}

/// Why a completion produced no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The shared cancellation token fired. Expected, never reported to the room.
    Cancelled,
    /// Anything else: transport, HTTP status, model error.
    Failed(String),
}

impl ProviderError {
    pub fn failed(msg: impl Into<String>) -> Self {
        ProviderError::Failed(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Cancelled => write!(f, "Completion cancelled"),
            ProviderError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for ProviderError {}

/// A completion endpoint shared by every agent that references its kind.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Display label, shown on join messages.
    fn name(&self) -> &str;

    /// Request a completion, streaming into `sink` when one is given.
    async fn complete(
        &self,
        request: CompletionRequest,
        sink: Option<&mut dyn TokenSink>,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError>;

    /// Usage reported by the most recent call, when the backend reports it.
    fn last_usage(&self) -> Option<TokenUsage> {
        None
    }
}

/// Provider kinds by name, resolved once when a room is built.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CompletionProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `kind` (builder pattern).
    pub fn with_provider(
        mut self,
        kind: impl Into<String>,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        self.register(kind, provider);
        self
    }

    pub fn register(&mut self, kind: impl Into<String>, provider: Arc<dyn CompletionProvider>) {
        self.providers.insert(kind.into(), provider);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn CompletionProvider>> {
        self.providers.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.providers.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.providers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Build OpenAI-compatible providers for every credential found in the
    /// environment: `OPEN_AI_SECRET` (openai), `XAI_API_KEY` (grok),
    /// `ANTHROPIC_KEY` (claude), `GEMINI_API_KEY` (gemini) and
    /// `OLLAMA_BASE_URL` (ollama, no key needed).
    pub fn from_env() -> Self {
        let mut registry = Self::new();
        for preset in Preset::ALL {
            if let Some(client) = OpenAICompatibleClient::from_env(preset) {
                log::info!(
                    "agentroom::provider::from_env(): registered provider '{}'",
                    preset.kind()
                );
                registry.register(preset.kind(), Arc::new(client));
            }
        }
        registry
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
