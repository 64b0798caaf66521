//! Context assembly pipeline.
//!
//! Builds the outbound message sequence for one model call from three layers:
//!
//! 1. **Recall**: at most one synthetic system message listing past messages
//!    that are close in embedding space to the newest message of the turn
//! 2. **History**: prior turns, bounded by a [`HistoryPolicy`]
//! 3. **Turn**: every message of the in-progress turn, untrimmed
//!
//! The context is rebuilt from storage every round, so whatever the previous
//! round committed (assistant reply, tool results) is visible to the next.
//!
//! # Determinism
//!
//! For a fixed store, identical inputs produce identical outputs. Recall
//! candidates arrive ordered by distance with ties broken by message id.

use bashbot_config::{HistoryMode, MemoryConfig};
use bashbot_core::error::MemoryError;
use bashbot_core::memory::MemoryBackend;
use bashbot_core::message::{
    ChatMessage, ScoredMessage, StoredMessage, TurnId, select_within_word_budget,
};
use std::collections::HashSet;
use tracing::debug;

/// First line of the synthetic recall message.
pub const RECALL_HEADER: &str = "Relevant memories from earlier conversations:";

/// How much prior-turn history goes into the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// The most recent `n` messages before the current turn.
    MessageCount(usize),
    /// The newest prior-turn messages whose content fits in `w` words.
    WordBudget(usize),
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self::MessageCount(10)
    }
}

impl HistoryPolicy {
    pub fn from_config(config: &MemoryConfig) -> Self {
        match config.history_mode {
            HistoryMode::MessageCount => Self::MessageCount(config.history_limit),
            HistoryMode::WordBudget => Self::WordBudget(config.context_word_limit),
        }
    }
}

/// The assembled context plus per-layer counts for logging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    pub messages: Vec<ChatMessage>,
    pub recalled: usize,
    pub history: usize,
    pub turn: usize,
}

/// The context assembler.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    history: HistoryPolicy,
    recall_top_k: usize,
    recall_max_distance: f32,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            history: HistoryPolicy::default(),
            recall_top_k: 5,
            recall_max_distance: 1.0,
        }
    }
}

impl ContextAssembler {
    pub fn new(history: HistoryPolicy) -> Self {
        Self {
            history,
            ..Self::default()
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            history: HistoryPolicy::from_config(config),
            recall_top_k: config.recall_top_k,
            recall_max_distance: config.recall_max_distance,
        }
    }

    /// Set the recall limits. `top_k == 0` disables recall.
    pub fn with_recall(mut self, top_k: usize, max_distance: f32) -> Self {
        self.recall_top_k = top_k;
        self.recall_max_distance = max_distance;
        self
    }

    pub fn history_policy(&self) -> HistoryPolicy {
        self.history
    }

    /// Assemble the outbound messages for a round of `turn_id`.
    pub async fn assemble(
        &self,
        memory: &dyn MemoryBackend,
        turn_id: TurnId,
    ) -> Result<AssembledContext, MemoryError> {
        let turn_records = memory.turn_records(turn_id).await?;
        let turn: Vec<ChatMessage> = turn_records.iter().map(StoredMessage::to_chat).collect();

        let history = match self.history {
            HistoryPolicy::MessageCount(n) => memory.prior_history(turn_id, n).await?,
            HistoryPolicy::WordBudget(w) => {
                let all = memory.prior_history(turn_id, usize::MAX).await?;
                if all.is_empty() {
                    all
                } else {
                    select_within_word_budget(all, w)
                }
            }
        };

        let recalled = self.recall(memory, &turn_records, &history).await?;

        let mut messages = Vec::with_capacity(1 + history.len() + turn.len());
        let recalled_count = recalled.len();
        if !recalled.is_empty() {
            messages.push(ChatMessage::system(render_recall(&recalled)));
        }
        let history_count = history.len();
        let turn_count = turn.len();
        messages.extend(history);
        messages.extend(turn);

        debug!(
            turn_id,
            recalled = recalled_count,
            history = history_count,
            turn = turn_count,
            "Context assembled"
        );

        Ok(AssembledContext {
            messages,
            recalled: recalled_count,
            history: history_count,
            turn: turn_count,
        })
    }

    /// Similarity recall keyed on the newest message of the turn.
    async fn recall(
        &self,
        memory: &dyn MemoryBackend,
        turn_records: &[StoredMessage],
        history: &[ChatMessage],
    ) -> Result<Vec<ScoredMessage>, MemoryError> {
        if self.recall_top_k == 0 {
            return Ok(Vec::new());
        }
        let Some(newest) = turn_records.last() else {
            return Ok(Vec::new());
        };

        let query = match &newest.embedding {
            Some(vector) if !vector.is_empty() => vector.clone(),
            _ if newest.content.is_empty() => Vec::new(),
            _ => memory.embed_query(&newest.content).await,
        };
        if query.is_empty() {
            debug!(message_id = newest.id, "No query vector, recall skipped");
            return Ok(Vec::new());
        }

        let candidates = memory
            .similar(&query, self.recall_top_k, self.recall_max_distance)
            .await?;

        let mut seen: HashSet<String> = turn_records
            .iter()
            .flat_map(|m| [m.content.clone(), m.folded_content()])
            .chain(history.iter().map(|m| m.content.clone()))
            .collect();

        Ok(candidates
            .into_iter()
            .filter(|c| {
                let folded = c.message.folded_content();
                if seen.contains(&folded) || seen.contains(&c.message.content) {
                    return false;
                }
                seen.insert(c.message.content.clone());
                seen.insert(folded);
                true
            })
            .collect())
    }
}

fn render_recall(recalled: &[ScoredMessage]) -> String {
    let mut out = String::from(RECALL_HEADER);
    for scored in recalled {
        let m = &scored.message;
        out.push_str(&format!(
            "\n[Turn {}, {}, {}] {}",
            m.turn_id,
            m.timestamp.format("%Y-%m-%d %H:%M"),
            m.role,
            m.folded_content()
        ));
    }
    out
}
