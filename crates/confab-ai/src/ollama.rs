//! Ollama chat API client
//!
//! The chat endpoint streams newline-delimited JSON: one object per
//! fragment, with a final object carrying `done: true` and eval counts.

use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    stream::{ChunkEvent, ChunkStream},
    types::ChatMessage,
};

/// Client for an Ollama-compatible model server
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    /// Default base URL for a locally hosted server
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";

    /// Create a new client against the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create from the `CONFAB_OLLAMA_URL` environment variable, falling
    /// back to the local default
    pub fn from_env() -> Self {
        let base_url = std::env::var("CONFAB_OLLAMA_URL")
            .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    /// Get the configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stream a chat reply for the given message list.
    ///
    /// Fragments are yielded in arrival order; the stream ends with a
    /// single terminal `Done` or `Error` event.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model,
            messages,
            stream: true,
        };

        tracing::debug!(model, count = messages.len(), "sending chat request");

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = parse_error_body(&text).unwrap_or(text);
            return Err(Error::api(status.as_u16(), message));
        }

        Ok(Box::pin(create_stream(response)))
    }

    /// List models installed on the server
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), text));
        }

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models)
    }
}

/// A model installed on the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name, e.g. "deepseek-r1:8b"
    pub name: String,
    /// On-disk size in bytes
    #[serde(default)]
    pub size: u64,
}

fn create_stream(response: reqwest::Response) -> impl futures::Stream<Item = ChunkEvent> {
    stream! {
        let mut byte_stream = response.bytes_stream();
        // Buffered as bytes: a network chunk may split a multi-byte
        // character, so decoding waits for a complete line.
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(result) = byte_stream.next().await {
            let bytes = match result {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield ChunkEvent::Error {
                        message: format!("Stream read error: {e}"),
                    };
                    return;
                }
            };
            buffer.extend_from_slice(&bytes);

            // Process complete NDJSON lines
            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                for event in line_events(line.trim()) {
                    let terminal = event.is_terminal();
                    yield event;
                    if terminal {
                        return;
                    }
                }
            }
        }

        // The backend may omit the trailing newline on the last line.
        let leftover = String::from_utf8_lossy(&buffer);
        for event in line_events(leftover.trim()) {
            let terminal = event.is_terminal();
            yield event;
            if terminal {
                return;
            }
        }

        // The connection closed before the backend signalled completion.
        yield ChunkEvent::Error {
            message: "stream ended before completion".to_string(),
        };
    }
}

/// Turn one NDJSON line into chunk events.
///
/// A final chunk may carry both a trailing fragment and `done: true`, so
/// this can produce up to two events; the terminal one always comes last.
fn line_events(line: &str) -> Vec<ChunkEvent> {
    if line.is_empty() {
        return vec![];
    }

    let chunk: ChatChunk = match parse_chunk(line) {
        Ok(chunk) => chunk,
        Err(e) => {
            return vec![ChunkEvent::Error {
                message: format!("Failed to parse chunk: {e}"),
            }];
        }
    };

    if let Some(message) = chunk.error {
        return vec![ChunkEvent::Error { message }];
    }

    let mut events = Vec::new();
    if let Some(text) = chunk.delta_text() {
        events.push(ChunkEvent::Delta { text });
    }
    if chunk.done {
        events.push(ChunkEvent::Done {
            prompt_tokens: chunk.prompt_eval_count,
            completion_tokens: chunk.eval_count,
        });
    }
    events
}

fn parse_chunk(line: &str) -> serde_json::Result<ChatChunk> {
    serde_json::from_str(line)
}

/// Extract the `error` field from a JSON error body, if it is one
fn parse_error_body(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v.get("error")?.as_str().map(|s| s.to_string())
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

impl ChatChunk {
    fn delta_text(&self) -> Option<String> {
        self.message
            .as_ref()
            .filter(|m| !m.content.is_empty())
            .map(|m| m.content.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}
