//! `OpenAICompatibleClient` serves every backend that speaks the OpenAI Chat
//! Completions protocol: OpenAI itself, xAI Grok, Anthropic's and Google's
//! compatibility endpoints, and a local Ollama.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentroom::clients::openai::{OpenAICompatibleClient, Preset};
//! use agentroom::provider::{ChatRole, CompletionProvider, CompletionRequest, PromptMessage};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let key = std::env::var("OPEN_AI_SECRET").unwrap_or_default();
//!     let client = OpenAICompatibleClient::from_preset(Preset::OpenAI, &key);
//!     let request = CompletionRequest {
//!         model: "gpt-4.1-nano".into(),
//!         messages: vec![PromptMessage::new(ChatRole::User, "Say hi")],
//!         temperature: 0.9,
//!         max_tokens: 50,
//!     };
//!     match client.complete(request, None, &CancellationToken::new()).await {
//!         Ok(text) => println!("{}", text),
//!         Err(err) => eprintln!("{}", err),
//!     }
//!     if let Some(usage) = client.last_usage() {
//!         println!("tokens: {}", usage.total_tokens);
//!     }
//! }
//! ```

use std::sync::Mutex;

use async_trait::async_trait;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::clients::common::{forward_chat_stream, get_shared_http_client};
use crate::provider::{
    CompletionProvider, CompletionRequest, ProviderError, TokenSink, TokenUsage,
};

/// Known OpenAI-compatible backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    OpenAI,
    Grok,
    Claude,
    Gemini,
    Ollama,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::OpenAI,
        Preset::Grok,
        Preset::Claude,
        Preset::Gemini,
        Preset::Ollama,
    ];

    /// Registry key agents use to reference this backend.
    pub fn kind(self) -> &'static str {
        match self {
            Preset::OpenAI => "openai",
            Preset::Grok => "grok",
            Preset::Claude => "claude",
            Preset::Gemini => "gemini",
            Preset::Ollama => "ollama",
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            Preset::OpenAI => "https://api.openai.com",
            Preset::Grok => "https://api.x.ai",
            Preset::Claude => "https://api.anthropic.com",
            Preset::Gemini => "https://generativelanguage.googleapis.com",
            Preset::Ollama => "http://localhost:11434",
        }
    }

    pub fn url_path(self) -> &'static str {
        match self {
            Preset::Gemini => "/v1beta/openai/chat/completions",
            _ => "/v1/chat/completions",
        }
    }

    /// Environment variable holding the credential (the base URL, for Ollama).
    pub fn env_var(self) -> &'static str {
        match self {
            Preset::OpenAI => "OPEN_AI_SECRET",
            Preset::Grok => "XAI_API_KEY",
            Preset::Claude => "ANTHROPIC_KEY",
            Preset::Gemini => "GEMINI_API_KEY",
            Preset::Ollama => "OLLAMA_BASE_URL",
        }
    }
}

pub struct OpenAICompatibleClient {
    client: openai_rust::Client,
    label: String,
    secret_key: String,
    base_url: String,
    url_path: String,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAICompatibleClient {
    /// Client for an arbitrary OpenAI-compatible endpoint.
    pub fn new(label: &str, secret_key: &str, base_url: &str, url_path: &str) -> Self {
        OpenAICompatibleClient {
            client: openai_rust::Client::new_with_client_and_base_url(
                secret_key,
                get_shared_http_client().clone(),
                base_url,
            ),
            label: label.to_string(),
            secret_key: secret_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            url_path: url_path.to_string(),
            token_usage: Mutex::new(None),
        }
    }

    pub fn from_preset(preset: Preset, secret_key: &str) -> Self {
        Self::new(preset.kind(), secret_key, preset.base_url(), preset.url_path())
    }

    /// Build a client from the preset's environment variable, if it is set.
    /// Ollama needs no key; its variable only overrides the base URL.
    pub fn from_env(preset: Preset) -> Option<Self> {
        let value = std::env::var(preset.env_var()).ok();
        match preset {
            Preset::Ollama => {
                let base_url = value?;
                Some(Self::new(
                    preset.kind(),
                    "ollama",
                    base_url.trim_end_matches('/'),
                    preset.url_path(),
                ))
            }
            _ => value
                .filter(|key| !key.trim().is_empty())
                .map(|key| Self::from_preset(preset, &key)),
        }
    }

    fn record_usage(&self, usage: Option<TokenUsage>) {
        if let Ok(mut slot) = self.token_usage.lock() {
            *slot = usage;
        }
    }

    fn failure(&self, context: &str, err: impl std::fmt::Display) -> ProviderError {
        log::error!(
            "agentroom::clients::openai::{}(...): {} API error: {}",
            context,
            self.label,
            err
        );
        ProviderError::failed(format!("{} error: {}", self.label, err))
    }

    /// One request, whole reply at once.
    async fn complete_blocking(
        &self,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        let formatted_messages: Vec<chat::Message> = request
            .messages
            .iter()
            .map(|msg| chat::Message {
                role: msg.role.as_str().to_owned(),
                content: msg.content.clone(),
            })
            .collect();

        let mut chat_arguments = chat::ChatArguments::new(&request.model, formatted_messages);
        chat_arguments.temperature = Some(request.temperature);
        chat_arguments.max_tokens = Some(request.max_tokens);

        // Dropping the request future aborts the underlying transfer.
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = self.client.create_chat(chat_arguments, Some(self.url_path.clone())) => response,
        };
        let response = response.map_err(|err| self.failure("complete_blocking", err))?;

        self.record_usage(Some(TokenUsage {
            input_tokens: response.usage.prompt_tokens as usize,
            output_tokens: response.usage.completion_tokens as usize,
            total_tokens: response.usage.total_tokens as usize,
        }));

        response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| ProviderError::failed(format!("{} returned no choices", self.label)))
    }

    /// Server-sent events request; each content delta goes to `sink` as it lands.
    async fn complete_streaming(
        &self,
        request: CompletionRequest,
        sink: &mut dyn TokenSink,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| json!({ "role": msg.role.as_str(), "content": msg.content }))
            .collect();
        let body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        let send = get_shared_http_client()
            .post(format!("{}{}", self.base_url, self.url_path))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            response = send => response,
        };
        let response = response.map_err(|err| self.failure("complete_streaming", err))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(self.failure("complete_streaming", format!("{} {}", status, detail.trim())));
        }

        let reply = forward_chat_stream(&self.label, response.bytes_stream(), sink, cancel).await?;
        self.record_usage(reply.usage);
        Ok(reply.text)
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompatibleClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        sink: Option<&mut dyn TokenSink>,
        cancel: &CancellationToken,
    ) -> Result<String, ProviderError> {
        match sink {
            Some(sink) => self.complete_streaming(request, sink, cancel).await,
            None => self.complete_blocking(request, cancel).await,
        }
    }

    fn last_usage(&self) -> Option<TokenUsage> {
        self.token_usage.lock().ok().and_then(|slot| slot.clone())
    }
}
