//! The agent turn loop implementation.

use crate::context::ContextAssembler;
use crate::stream_event::AgentEvent;
use crate::stream_state::StreamState;
use bashbot_config::AppConfig;
use bashbot_core::error::ProviderError;
use bashbot_core::memory::MemoryBackend;
use bashbot_core::message::{NewMessage, TurnId};
use bashbot_core::provider::{Provider, ProviderRequest, Usage};
use bashbot_core::tool::TOOL_ERROR_PREFIX;
use bashbot_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model answered without requesting tools.
    Completed,
    /// Every round requested tools and the round cap was hit.
    RoundLimitReached,
}

/// Summary of a finished turn. Everything in it is already persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub turn_id: TurnId,
    /// Content of the last assistant message of the turn.
    pub answer: String,
    pub rounds: usize,
    pub tool_calls_made: usize,
    pub status: TurnStatus,
    /// Usage reported by the last model call.
    pub usage: Option<Usage>,
}

/// The core agent loop that orchestrates model calls and tool execution.
pub struct AgentLoop {
    /// The generation backend
    provider: Arc<dyn Provider>,

    /// Durable conversation log; the only source of context
    memory: Arc<dyn MemoryBackend>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    assembler: ContextAssembler,

    /// The model to use
    model: String,

    /// Maximum model calls per turn
    max_rounds: usize,

    /// Optional sink for live events
    events: Option<UnboundedSender<AgentEvent>>,
}

impl AgentLoop {
    /// Create a new agent loop.
    pub fn new(
        provider: Arc<dyn Provider>,
        memory: Arc<dyn MemoryBackend>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            memory,
            tools,
            assembler: ContextAssembler::default(),
            model: model.into(),
            max_rounds: 5,
            events: None,
        }
    }

    /// Create an agent loop with model, round cap and context policy taken
    /// from `config`.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        memory: Arc<dyn MemoryBackend>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(provider, memory, tools, config.model.clone())
            .with_max_rounds(config.agent.max_rounds)
            .with_assembler(ContextAssembler::from_config(&config.memory))
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Forward live events to `tx`.
    pub fn with_events(mut self, tx: UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn memory(&self) -> &Arc<dyn MemoryBackend> {
        &self.memory
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event);
        }
    }

    /// Run one turn for `input`.
    ///
    /// Each round assembles context from storage, streams one generation,
    /// persists one assistant message and, if the model asked for tools,
    /// dispatches them in order and persists each result. A transport error
    /// aborts the turn; messages committed by earlier rounds stay.
    pub async fn run_turn(&self, input: &str) -> Result<TurnOutcome, bashbot_core::Error> {
        let turn_id = self.memory.next_turn_id().await?;
        self.memory.append(NewMessage::user(turn_id, input)).await?;

        info!(turn_id, model = %self.model, "Starting turn");

        let mut answer = String::new();
        let mut usage = None;
        let mut tool_calls_made = 0;

        for round in 1..=self.max_rounds {
            let context = self.assembler.assemble(self.memory.as_ref(), turn_id).await?;
            debug!(turn_id, round, messages = context.messages.len(), "Calling model");

            let request = ProviderRequest::new(self.model.clone(), context.messages)
                .with_tools(self.tools.definitions().to_vec());
            let state = self.stream_round(request).await?;

            self.memory.append(state.to_message(turn_id)).await?;
            answer = state.content.clone();
            usage = state.usage.clone();
            self.emit(AgentEvent::RoundComplete {
                round,
                usage: state.usage.clone(),
            });

            if !state.has_tool_calls() {
                info!(turn_id, rounds = round, tool_calls_made, "Turn complete");
                self.emit(AgentEvent::TurnComplete {
                    turn_id,
                    rounds: round,
                    status: TurnStatus::Completed,
                });
                return Ok(TurnOutcome {
                    turn_id,
                    answer,
                    rounds: round,
                    tool_calls_made,
                    status: TurnStatus::Completed,
                    usage,
                });
            }

            debug!(turn_id, round, tool_count = state.tool_calls.len(), "Executing tool calls");
            for call in &state.tool_calls {
                self.emit(AgentEvent::ToolCall {
                    name: call.name().to_string(),
                    arguments: call.arguments().clone(),
                });

                let output = self.tools.dispatch(call, Some(self.memory.as_ref())).await;
                self.memory
                    .append(NewMessage::tool(turn_id, output.clone()))
                    .await?;
                tool_calls_made += 1;

                self.emit(AgentEvent::ToolResult {
                    name: call.name().to_string(),
                    success: !output.starts_with(TOOL_ERROR_PREFIX),
                    output,
                });
            }
        }

        warn!(
            turn_id,
            rounds = self.max_rounds,
            "Round limit reached before a final answer"
        );
        self.emit(AgentEvent::TurnComplete {
            turn_id,
            rounds: self.max_rounds,
            status: TurnStatus::RoundLimitReached,
        });
        Ok(TurnOutcome {
            turn_id,
            answer,
            rounds: self.max_rounds,
            tool_calls_made,
            status: TurnStatus::RoundLimitReached,
            usage,
        })
    }

    /// Stream one generation to completion, forwarding fragments as events.
    async fn stream_round(&self, request: ProviderRequest) -> Result<StreamState, ProviderError> {
        let mut rx = self.provider.stream(request).await?;
        let mut state = StreamState::default();

        while let Some(item) = rx.recv().await {
            let chunk = item?;
            if let Some(thinking) = &chunk.thinking {
                self.emit(AgentEvent::Thinking {
                    content: thinking.clone(),
                });
            }
            if let Some(content) = &chunk.content {
                self.emit(AgentEvent::Content {
                    content: content.clone(),
                });
            }
            state = state.apply(chunk);
            if state.done {
                return Ok(state);
            }
        }

        Err(ProviderError::StreamInterrupted(
            "stream ended before the final increment".into(),
        ))
    }
}
