//! Message and turn domain types.
//!
//! A conversation is an append-only log of messages grouped into turns:
//! the user speaks → the assistant answers (possibly calling tools over
//! several rounds) → the next user input opens a new turn.
//!
//! Three shapes of message flow through the system:
//! - [`NewMessage`]: what the agent asks the store to append
//! - [`StoredMessage`]: an immutable row read back from the store
//! - [`ChatMessage`]: the `{role, content, tool_calls?}` shape sent to the model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// Identifier of one user-initiated exchange. Starts at 1, strictly increasing.
pub type TurnId = i64;

/// Opening marker of a folded reasoning block.
pub const THINK_OPEN: &str = "<think>";
/// Closing marker of a folded reasoning block.
pub const THINK_CLOSE: &str = "</think>";

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// Tool execution result
    Tool,
    /// Synthetic instructions (recalled memories)
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        }
    }

    /// Whether messages of this role get an embedding when their content is non-empty.
    pub fn is_embedded(&self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            "system" => Ok(Role::System),
            other => Err(MemoryError::InvalidRole(other.to_string())),
        }
    }
}

/// A tool invocation requested by the model.
///
/// Wire shape: `{"function": {"name": "...", "arguments": {...}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: ToolFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,

    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            function: ToolFunction {
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn arguments(&self) -> &serde_json::Value {
        &self.function.arguments
    }
}

/// A message about to be appended to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub turn_id: TurnId,
    pub role: Role,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub thoughts: Option<String>,
}

impl NewMessage {
    pub fn new(turn_id: TurnId, role: Role, content: impl Into<String>) -> Self {
        Self {
            turn_id,
            role,
            content: content.into(),
            tool_calls: None,
            thoughts: None,
        }
    }

    /// Create a new user message.
    pub fn user(turn_id: TurnId, content: impl Into<String>) -> Self {
        Self::new(turn_id, Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(turn_id: TurnId, content: impl Into<String>) -> Self {
        Self::new(turn_id, Role::Assistant, content)
    }

    /// Create a tool result message.
    pub fn tool(turn_id: TurnId, content: impl Into<String>) -> Self {
        Self::new(turn_id, Role::Tool, content)
    }

    /// Attach tool calls. An empty list is stored as absent.
    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = if calls.is_empty() { None } else { Some(calls) };
        self
    }

    /// Attach a reasoning trace. Blank traces are stored as absent.
    pub fn with_thoughts(mut self, thoughts: impl Into<String>) -> Self {
        let thoughts = thoughts.into();
        self.thoughts = if thoughts.trim().is_empty() {
            None
        } else {
            Some(thoughts)
        };
        self
    }
}

/// An immutable message row as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub turn_id: TurnId,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<String>,

    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl StoredMessage {
    /// Content with the reasoning trace folded in front, as the model sees it.
    pub fn folded_content(&self) -> String {
        fold_thoughts(self.thoughts.as_deref(), &self.content)
    }

    /// Convert to the outbound shape, keeping tool calls.
    pub fn to_chat(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.folded_content(),
            tool_calls: self.tool_calls.clone(),
        }
    }
}

/// A message in the shape sent to the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A stored message together with its vector distance to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMessage {
    pub message: StoredMessage,
    pub distance: f32,
}

/// Prepend a reasoning trace to content as a visible `<think>` block.
pub fn fold_thoughts(thoughts: Option<&str>, content: &str) -> String {
    match thoughts {
        Some(t) if !t.is_empty() => format!("{THINK_OPEN}{t}{THINK_CLOSE}\n{content}"),
        _ => content.to_string(),
    }
}

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Keep the newest messages whose combined word count fits in `budget`.
///
/// Selection walks from the newest message backwards and stops before the
/// first message that would overflow the budget. The newest message is always
/// kept, even when it alone exceeds the budget. Only `content` is counted;
/// tool-call payloads are not prose and do not consume budget.
pub fn select_within_word_budget(messages: Vec<ChatMessage>, budget: usize) -> Vec<ChatMessage> {
    let mut selected = Vec::new();
    let mut words = 0usize;

    for message in messages.into_iter().rev() {
        let n = word_count(&message.content);
        if words + n > budget && !selected.is_empty() {
            break;
        }
        words += n;
        selected.push(message);
    }

    selected.reverse();
    selected
}
