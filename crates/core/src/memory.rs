//! Memory trait — the durable, turn-structured conversation log.
//!
//! The store is append-only: every message is written once, when final, and
//! never mutated. Reads come in three flavours:
//! - recency (word-budgeted context, prior-turn history)
//! - the in-progress turn itself
//! - recall (vector similarity and plain substring search)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;
use crate::message::{ChatMessage, NewMessage, ScoredMessage, StoredMessage, TurnId};

/// Aggregate counters for operator-facing reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub messages: usize,
    pub embedded: usize,
    pub latest_turn_id: Option<TurnId>,
}

/// The core memory backend trait.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Name of this backend (e.g., "sqlite").
    fn name(&self) -> &str;

    /// The next unused turn identifier: `max(turn_id) + 1`, or 1 when empty.
    async fn next_turn_id(&self) -> std::result::Result<TurnId, MemoryError>;

    /// Append one message, embedding user/assistant content before the write.
    /// Returns the row id assigned to the message.
    async fn append(&self, message: NewMessage) -> std::result::Result<i64, MemoryError>;

    /// Newest messages across all turns that fit in `word_budget` words,
    /// returned in chronological order. Never empty on a non-empty store.
    async fn recent_context(
        &self,
        word_budget: usize,
    ) -> std::result::Result<Vec<ChatMessage>, MemoryError>;

    /// Raw rows of one turn, chronological, embeddings included.
    async fn turn_records(
        &self,
        turn_id: TurnId,
    ) -> std::result::Result<Vec<StoredMessage>, MemoryError>;

    /// The most recent `limit` rows with `turn_id < before`, chronological.
    async fn prior_records(
        &self,
        before: TurnId,
        limit: usize,
    ) -> std::result::Result<Vec<StoredMessage>, MemoryError>;

    /// Messages of one turn in outbound shape, thoughts folded in.
    async fn turn_messages(
        &self,
        turn_id: TurnId,
    ) -> std::result::Result<Vec<ChatMessage>, MemoryError> {
        let records = self.turn_records(turn_id).await?;
        Ok(records.iter().map(StoredMessage::to_chat).collect())
    }

    /// Prior-turn history in outbound shape, thoughts folded in.
    async fn prior_history(
        &self,
        before: TurnId,
        limit: usize,
    ) -> std::result::Result<Vec<ChatMessage>, MemoryError> {
        let records = self.prior_records(before, limit).await?;
        Ok(records.iter().map(StoredMessage::to_chat).collect())
    }

    /// Nearest neighbours of `query` by L2 distance, strictly below
    /// `max_distance`, ascending, at most `top_k`. Empty query → empty result.
    async fn similar(
        &self,
        query: &[f32],
        top_k: usize,
        max_distance: f32,
    ) -> std::result::Result<Vec<ScoredMessage>, MemoryError>;

    /// Case-insensitive substring search over user/assistant content,
    /// rendered as a text report for tool consumption.
    async fn text_search(&self, term: &str) -> std::result::Result<String, MemoryError>;

    /// Embed arbitrary text with the store's embedder. Empty on failure.
    async fn embed_query(&self, text: &str) -> Vec<f32>;

    /// Counters for the operator.
    async fn stats(&self) -> std::result::Result<MemoryStats, MemoryError>;

    /// Release the underlying connection. Stored data is untouched.
    async fn close(&self) {}
}
