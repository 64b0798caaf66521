//! Accumulated state of one streamed generation.
//!
//! [`StreamState::apply`] is a pure fold: it takes the state so far and one
//! increment and returns the next state. The agent loop drives it from the
//! provider channel; tests drive it from plain vectors.

use bashbot_core::message::{NewMessage, ToolCall, TurnId};
use bashbot_core::provider::{StreamChunk, Usage};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamState {
    pub thinking: String,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub done: bool,
}

impl StreamState {
    /// Fold one increment into the state.
    ///
    /// Fragments of the same kind concatenate in arrival order and tool calls
    /// append in arrival order. Usage is taken from the terminal increment.
    pub fn apply(mut self, chunk: StreamChunk) -> Self {
        if let Some(thinking) = chunk.thinking {
            self.thinking.push_str(&thinking);
        }
        if let Some(content) = chunk.content {
            self.content.push_str(&content);
        }
        self.tool_calls.extend(chunk.tool_calls);
        if chunk.done {
            self.done = true;
            if chunk.usage.is_some() {
                self.usage = chunk.usage;
            }
        }
        self
    }

    /// Fold a whole sequence of increments from the empty state.
    pub fn from_chunks(chunks: impl IntoIterator<Item = StreamChunk>) -> Self {
        chunks.into_iter().fold(Self::default(), Self::apply)
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// The assistant message this generation persists as.
    pub fn to_message(&self, turn_id: TurnId) -> NewMessage {
        NewMessage::assistant(turn_id, self.content.clone())
            .with_tool_calls(self.tool_calls.clone())
            .with_thoughts(self.thinking.clone())
    }
}
