//! Chat backends driven by the run loop.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("chat request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("failed to decode chat response: {0}")]
    Decode(String),

    #[error("chat response contained no text")]
    EmptyResponse,
}

/// One completed round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    /// Set only by streaming backends.
    pub time_to_first_token_ms: Option<f64>,
}

/// A chat-completion service. One call is one timed iteration.
pub trait ChatBackend: Send {
    fn complete(&self, prompt: &str) -> Result<ChatReply, BackendError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Deserialize, Default)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: ReplyMessage,
    #[serde(default)]
    done: bool,
}

/// Ollama `/api/chat`.
pub struct OllamaChatBackend {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    stream: bool,
}

impl OllamaChatBackend {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, stream: bool) -> Self {
        Self::with_timeout(endpoint, model, stream, DEFAULT_CHAT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        stream: bool,
        timeout: Duration,
    ) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            stream,
        }
    }

    fn url(&self) -> String {
        format!("{}/api/chat", self.endpoint)
    }
}

impl ChatBackend for OllamaChatBackend {
    fn complete(&self, prompt: &str) -> Result<ChatReply, BackendError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            stream: self.stream,
        };
        let started = Instant::now();
        let mut response = self.agent.post(&self.url()).send_json(&request)?;

        if !self.stream {
            let chunk: ChatChunk = response.body_mut().read_json()?;
            if chunk.message.content.is_empty() {
                return Err(BackendError::EmptyResponse);
            }
            return Ok(ChatReply {
                text: chunk.message.content,
                time_to_first_token_ms: None,
            });
        }

        let reader = BufReader::new(response.body_mut().as_reader());
        read_stream(reader, started)
    }
}

/// Accumulate NDJSON chunks. Time to first token is taken at the first
/// chunk carrying text.
fn read_stream<R: BufRead>(reader: R, started: Instant) -> Result<ChatReply, BackendError> {
    let mut text = String::new();
    let mut first_token = None;

    for line in reader.lines() {
        let line = line.map_err(|e| BackendError::Decode(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let chunk: ChatChunk =
            serde_json::from_str(&line).map_err(|e| BackendError::Decode(e.to_string()))?;
        if !chunk.message.content.is_empty() {
            if first_token.is_none() {
                first_token = Some(started.elapsed().as_secs_f64() * 1000.0);
            }
            text.push_str(&chunk.message.content);
        }
        if chunk.done {
            break;
        }
    }

    if text.is_empty() {
        return Err(BackendError::EmptyResponse);
    }
    debug!(chars = text.len(), ttft_ms = first_token, "stream complete");
    Ok(ChatReply {
        text,
        time_to_first_token_ms: first_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_stream_concatenates_chunks() {
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
            "{\"done\":true}\n",
            "{\"message\":{\"content\":\"ignored\"},\"done\":false}\n",
        );
        let reply = read_stream(Cursor::new(body), Instant::now()).unwrap();
        assert_eq!(reply.text, "Hello");
        assert!(reply.time_to_first_token_ms.is_some_and(|t| t >= 0.0));
    }

    #[test]
    fn test_stream_without_text_is_empty_response() {
        let body = "{\"done\":true}\n";
        let err = read_stream(Cursor::new(body), Instant::now()).unwrap_err();
        assert!(matches!(err, BackendError::EmptyResponse));
    }

    #[test]
    fn test_malformed_chunk_is_decode_error() {
        let err = read_stream(Cursor::new("not json\n"), Instant::now()).unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[test]
    fn test_unreachable_endpoint_is_http_error() {
        let backend =
            OllamaChatBackend::with_timeout("http://127.0.0.1:9", "m", false, Duration::from_secs(2));
        assert!(matches!(backend.complete("hi"), Err(BackendError::Http(_))));
    }
}
