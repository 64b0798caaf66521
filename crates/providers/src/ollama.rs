//! Ollama chat provider.
//!
//! Talks to `POST {host}/api/chat` with `stream: true, think: true` and reads
//! the newline-delimited JSON response. Each line becomes one
//! [`StreamChunk`]; the terminal line (`done: true`) carries usage.
//!
//! Anything that is not a well-formed line aborts the stream with an error
//! item: the agent loop treats a malformed increment, a mid-stream `error`
//! object and a connection that closes before `done` the same way.

use async_trait::async_trait;
use bashbot_core::error::ProviderError;
use bashbot_core::message::ToolCall;
use bashbot_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, Usage};
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::model_info::ModelInfo;

/// An Ollama-backed streaming provider.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OllamaProvider {
    /// Create a provider for `base_url` (e.g. `http://localhost:11434`).
    ///
    /// `timeout_secs` bounds connecting and each idle gap between reads.
    /// A chat stream that keeps producing increments is never cut off;
    /// the short exchanges (`/api/show`, `/api/tags`) also get it as a
    /// total deadline.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    /// Create a provider from the application config.
    pub fn from_config(config: &bashbot_config::AppConfig) -> Result<Self, ProviderError> {
        Self::new(&config.ollama.host, config.ollama.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch `POST /api/show` for a model.
    pub async fn show_model(&self, model: &str) -> Result<ModelInfo, ProviderError> {
        let url = format!("{}/api/show", self.base_url);
        debug!(model = %model, "Fetching model info");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "model": model }))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(ProviderError::ModelNotFound(model.to_string()));
        }
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status_code: status,
                message: body,
            });
        }

        response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse model info: {e}"),
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming chat request"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 404 {
            return Err(ProviderError::ModelNotFound(request.model));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Ollama returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Read NDJSON lines and forward them as chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = LineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in lines.push(&bytes) {
                    match parse_line(&line) {
                        Ok(None) => continue,
                        Ok(Some(chunk)) => {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                            if done {
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(line = %line, "Unparseable stream line");
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }
            }

            // A final line without a trailing newline
            if let Some(line) = lines.finish() {
                match parse_line(&line) {
                    Ok(Some(chunk)) if chunk.done => {
                        let _ = tx.send(Ok(chunk)).await;
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }

            let _ = tx
                .send(Err(ProviderError::StreamInterrupted(
                    "stream closed before the final increment".into(),
                )))
                .await;
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

/// Splits a byte stream into complete `\n`-terminated lines.
///
/// Bytes are buffered raw so a multi-byte character split across network
/// reads is decoded only once its line is complete.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and drain every complete line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left after the stream ends, if not blank.
    pub(crate) fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer);
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }
}

/// Parse one NDJSON line into a chunk. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<StreamChunk>, ProviderError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let parsed: ChatStreamLine = serde_json::from_str(line)
        .map_err(|e| ProviderError::MalformedChunk(format!("{e}: {line}")))?;

    if let Some(error) = parsed.error {
        return Err(ProviderError::StreamInterrupted(error));
    }

    let message = parsed.message.unwrap_or_default();
    let usage = parsed.done.then(|| Usage {
        prompt_tokens: parsed.prompt_eval_count.unwrap_or(0),
        completion_tokens: parsed.eval_count.unwrap_or(0),
        eval_duration_ns: parsed.eval_duration,
    });

    Ok(Some(StreamChunk {
        thinking: message.thinking.filter(|t| !t.is_empty()),
        content: message.content.filter(|c| !c.is_empty()),
        tool_calls: message.tool_calls.unwrap_or_default(),
        done: parsed.done,
        usage,
    }))
}

// --- Ollama wire types (internal) ---

#[derive(Debug, Deserialize)]
struct ChatStreamLine {
    #[serde(default)]
    message: Option<LineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    eval_duration: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LineMessage {
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}
