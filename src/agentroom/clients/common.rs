//! Plumbing shared by every HTTP-backed provider.

use std::fmt::Display;
use std::time::Duration;

use futures_util::{pin_mut, Stream, StreamExt};
use lazy_static::lazy_static;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::provider::{ProviderError, TokenSink, TokenUsage};

lazy_static! {
    /// One pooled client for all providers, so connections and TLS sessions
    /// are reused across turns.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .build()
        .unwrap_or_else(|err| {
            log::error!(
                "agentroom::clients::common: failed to build pooled HTTP client ({}), using defaults",
                err
            );
            reqwest::Client::new()
        });
}

pub fn get_shared_http_client() -> &'static reqwest::Client {
    &SHARED_HTTP_CLIENT
}

/// Line buffer for a Server-Sent Events body. Bytes are held until a full
/// line arrives, so multi-byte characters split across chunks survive.
#[derive(Debug, Default)]
pub struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return the `data:` payloads of every completed line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(data) = std::str::from_utf8(&line).ok().and_then(extract_sse_data) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Payload of an unterminated final line, if any.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        std::str::from_utf8(&rest).ok().and_then(extract_sse_data)
    }
}

/// `data:` payload of one SSE line. Comments, blank lines and the `[DONE]`
/// terminator yield nothing.
fn extract_sse_data(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    Some(data.to_string())
}

#[derive(Debug, Default, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

/// What a finished stream produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamedReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Drain an OpenAI-style chat completion SSE body, forwarding each content
/// delta to `sink` as it arrives and checking `cancel` between chunks.
/// `sink.on_done` receives the text assembled from the deltas.
pub async fn forward_chat_stream<S, B, E>(
    label: &str,
    bytes: S,
    sink: &mut dyn TokenSink,
    cancel: &CancellationToken,
) -> Result<StreamedReply, ProviderError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    pin_mut!(bytes);
    let mut buffer = SseBuffer::new();
    let mut reply = StreamedReply {
        text: String::new(),
        usage: None,
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            next = bytes.next() => next,
        };
        let (payloads, ended) = match next {
            Some(Ok(chunk)) => (buffer.push(chunk.as_ref()), false),
            Some(Err(err)) => {
                log::error!(
                    "agentroom::clients::common::forward_chat_stream(...): {} stream error: {}",
                    label,
                    err
                );
                return Err(ProviderError::failed(format!("{} stream error: {}", label, err)));
            }
            None => (buffer.finish().into_iter().collect(), true),
        };

        for payload in payloads {
            let chunk: ChunkPayload = match serde_json::from_str(&payload) {
                Ok(chunk) => chunk,
                Err(err) => {
                    log::warn!(
                        "agentroom::clients::common::forward_chat_stream(...): {} sent an unreadable chunk: {}",
                        label,
                        err
                    );
                    continue;
                }
            };
            if let Some(usage) = chunk.usage {
                reply.usage = Some(TokenUsage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                    total_tokens: usage.total_tokens,
                });
            }
            let delta = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .unwrap_or_default();
            if !delta.is_empty() {
                reply.text.push_str(&delta);
                sink.on_token(&delta).await;
            }
        }

        if ended {
            break;
        }
    }

    sink.on_done(&reply.text).await;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::stream;

    #[derive(Default)]
    struct Collect {
        tokens: Vec<String>,
        done: Option<String>,
    }

    #[async_trait]
    impl TokenSink for Collect {
        async fn on_token(&mut self, chunk: &str) {
            self.tokens.push(chunk.to_string());
        }

        async fn on_done(&mut self, full_text: &str) {
            self.done = Some(full_text.to_string());
        }
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": text } }] })
        )
    }

    #[test]
    fn test_sse_buffer_joins_split_lines() {
        let mut buffer = SseBuffer::new();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        assert_eq!(buffer.push(b":1}\r\n\n: keep-alive\n"), vec!["{\"a\":1}"]);
        assert!(buffer.push(b"data: [DONE]\n").is_empty());
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_sse_buffer_keeps_split_utf8() {
        let line = "data: caf\u{e9}\n".as_bytes();
        let split = line.len() - 2;
        let mut buffer = SseBuffer::new();
        assert!(buffer.push(&line[..split]).is_empty());
        assert_eq!(buffer.push(&line[split..]), vec!["caf\u{e9}"]);
    }

    #[tokio::test]
    async fn test_deltas_reach_sink_one_by_one() {
        let body = format!(
            "{}{}{}data: {}\n\ndata: [DONE]\n\n",
            delta("Trams "),
            delta(""),
            delta("win."),
            serde_json::json!({
                "choices": [],
                "usage": { "prompt_tokens": 7, "completion_tokens": 2, "total_tokens": 9 }
            })
        );
        // Split mid-line to exercise buffering.
        let (a, b) = body.as_bytes().split_at(20);
        let chunks = vec![
            Ok::<Vec<u8>, std::io::Error>(a.to_vec()),
            Ok(b.to_vec()),
        ];

        let mut sink = Collect::default();
        let reply = forward_chat_stream("test", stream::iter(chunks), &mut sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply.text, "Trams win.");
        assert_eq!(sink.tokens, vec!["Trams ", "win."]);
        assert_eq!(sink.done.as_deref(), Some("Trams win."));
        assert_eq!(reply.usage.map(|u| u.total_tokens), Some(9));
    }

    #[tokio::test]
    async fn test_cancel_between_chunks() {
        let cancel = CancellationToken::new();
        let first = delta("partial");
        let stop = cancel.clone();
        // The second chunk never arrives; the caller gives up while waiting.
        let chunks = stream::iter(vec![Ok::<Vec<u8>, std::io::Error>(first.into_bytes())])
            .chain(stream::once(async move {
                stop.cancel();
                futures_util::future::pending::<Result<Vec<u8>, std::io::Error>>().await
            }));

        let mut sink = Collect::default();
        let result = forward_chat_stream("test", chunks, &mut sink, &cancel).await;

        assert_eq!(result, Err(ProviderError::Cancelled));
        assert_eq!(sink.tokens, vec!["partial"]);
        assert!(sink.done.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_fails_the_turn() {
        let chunks = vec![
            Ok(delta("half").into_bytes()),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "reset")),
        ];
        let mut sink = Collect::default();
        let result =
            forward_chat_stream("test", stream::iter(chunks), &mut sink, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ProviderError::Failed(ref msg)) if msg.contains("reset")));
    }
}
