//! Agent-level events for live presentation.
//!
//! `AgentEvent` turns the provider's raw increments and the loop's tool
//! rounds into events a console (or any other front end) can render as they
//! happen. Events are advisory: persistence never depends on them.

use crate::loop_runner::TurnStatus;
use bashbot_core::message::TurnId;
use bashbot_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted by the agent while a turn runs.
///
/// - `thinking`       — partial reasoning fragment
/// - `content`        — partial answer fragment
/// - `tool_call`      — the agent is invoking a tool
/// - `tool_result`    — a tool finished
/// - `round_complete` — one model call finished and was persisted
/// - `turn_complete`  — the turn ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Thinking {
        content: String,
    },

    Content {
        content: String,
    },

    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },

    /// `success` is false when the output carries the tool-error marker.
    ToolResult {
        name: String,
        output: String,
        success: bool,
    },

    RoundComplete {
        round: usize,
        usage: Option<Usage>,
    },

    TurnComplete {
        turn_id: TurnId,
        rounds: usize,
        status: TurnStatus,
    },
}

impl AgentEvent {
    /// Stable event name, matching the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::Content { .. } => "content",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::RoundComplete { .. } => "round_complete",
            Self::TurnComplete { .. } => "turn_complete",
        }
    }
}
