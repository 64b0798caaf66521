//! Provider trait — the abstraction over the generation backend.
//!
//! A Provider takes the assembled message sequence plus the tool manifests
//! and streams back increments. Each increment may carry a reasoning
//! fragment, a content fragment and/or tool-call descriptors; the final one
//! is marked `done` and carries usage statistics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::message::{ChatMessage, ToolCall};

/// A generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "bashbot", "qwen3:8b")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<ChatMessage>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Whether to stream the response
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Ask the model to emit a separate reasoning trace
    #[serde(default = "default_true")]
    pub think: bool,
}

fn default_true() -> bool {
    true
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            stream: true,
            think: true,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// A tool manifest, in the function-calling shape the backend expects.
///
/// ```json
/// {"type": "function", "function": {"name": "...", "description": "...",
///  "parameters": {"type": "object", "properties": {...}, "required": [...]}}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default = "default_tool_type")]
    pub kind: String,

    pub function: FunctionSchema,
}

fn default_tool_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the parameters
    #[serde(default = "empty_object_schema")]
    pub parameters: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: default_tool_type(),
            function: FunctionSchema {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Argument names listed under `parameters.required`, in declaration order.
    pub fn required_arguments(&self) -> Vec<&str> {
        self.function.parameters["required"]
            .as_array()
            .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Usage statistics carried by the terminal increment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,

    /// Generation time reported by the backend, in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_duration_ns: Option<u64>,
}

impl Usage {
    /// Completion tokens per second, when the backend reported a duration.
    pub fn tokens_per_second(&self) -> Option<f64> {
        match self.eval_duration_ns {
            Some(ns) if ns > 0 => Some(self.completion_tokens as f64 / (ns as f64 / 1e9)),
            _ => None,
        }
    }
}

/// A single increment in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial reasoning fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    /// Partial content fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Complete tool-call descriptors emitted in this increment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Whether this is the terminal increment
    #[serde(default)]
    pub done: bool,

    /// Usage info (only on the terminal increment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Receiving half of a streamed response.
pub type ChunkReceiver = mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
///
/// The agent loop calls `stream()` without knowing which backend answers.
/// A transport failure either fails the call outright or arrives as an
/// `Err` item on the channel; both abort the turn.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a stream of response increments.
    async fn stream(&self, request: ProviderRequest)
    -> std::result::Result<ChunkReceiver, ProviderError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
