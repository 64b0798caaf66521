//! SQLite memory store with a vector index.
//!
//! Uses a single SQLite database file with two tables:
//! - `messages` — the append-only conversation log
//! - `message_vectors` — one embedding per message id, the similarity index
//!
//! A message row and its vector row are written in one transaction. Nearest
//! neighbour lookup is an exact L2 scan over `message_vectors` (see
//! [`crate::vector`]).

use crate::vector;
use async_trait::async_trait;
use bashbot_core::embedding::Embedder;
use bashbot_core::error::MemoryError;
use bashbot_core::memory::{MemoryBackend, MemoryStats};
use bashbot_core::message::{
    ChatMessage, NewMessage, Role, ScoredMessage, StoredMessage, ToolCall, TurnId,
    select_within_word_budget,
};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Matches returned by [`MemoryBackend::text_search`].
const TEXT_SEARCH_LIMIT: i64 = 5;

const SELECT_MESSAGES: &str = r#"
    SELECT m.id, m.turn_id, m.timestamp, m.role, m.content, m.tool_calls, m.thoughts,
           v.embedding
    FROM messages m
    LEFT JOIN message_vectors v ON v.message_id = m.id
"#;

/// The SQLite-backed conversation store.
pub struct SqliteMemory {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
}

impl SqliteMemory {
    /// Open (creating if needed) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful
    /// for tests). The pool holds a single connection: one owner, one writer.
    pub async fn new(
        path: &str,
        embedder: Arc<dyn Embedder>,
        dimension: usize,
    ) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self::from_pool(pool, embedder, dimension).await?;
        info!(path, embedder = store.embedder.name(), dimension, "SQLite memory store initialized");
        Ok(store)
    }

    /// Open the store described by the application config.
    pub async fn from_config(
        config: &bashbot_config::AppConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, MemoryError> {
        Self::new(
            &config.memory.database_url(),
            embedder,
            config.memory.embedding_dimension,
        )
        .await
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(
        pool: SqlitePool,
        embedder: Arc<dyn Embedder>,
        dimension: usize,
    ) -> Result<Self, MemoryError> {
        let store = Self {
            pool,
            embedder,
            dimension,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// The fixed embedding dimension this store accepts.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Create tables and indexes if missing.
    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                turn_id     INTEGER NOT NULL,
                timestamp   TEXT NOT NULL,
                role        TEXT NOT NULL CHECK(role IN ('user', 'assistant', 'tool', 'system')),
                content     TEXT NOT NULL DEFAULT '',
                tool_calls  TEXT CHECK(tool_calls IS NULL OR role = 'assistant'),
                thoughts    TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_vectors (
                message_id  INTEGER PRIMARY KEY REFERENCES messages(id),
                dimension   INTEGER NOT NULL,
                embedding   BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("message_vectors table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_turn_id ON messages(turn_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::MigrationFailed(format!("turn_id index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Embed `text`, keeping the vector only when it has the configured dimension.
    async fn embed_checked(&self, text: &str) -> Option<Vec<f32>> {
        let vector = self.embedder.embed(text).await;
        if vector.is_empty() {
            return None;
        }
        if vector.len() != self.dimension {
            warn!(
                expected = self.dimension,
                got = vector.len(),
                "Embedding has wrong dimension, dropping it"
            );
            return None;
        }
        Some(vector)
    }

    /// Parse a `StoredMessage` from a SQLite row.
    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, MemoryError> {
        let id: i64 = row
            .try_get("id")
            .map_err(|e| MemoryError::QueryFailed(format!("id column: {e}")))?;
        let turn_id: i64 = row
            .try_get("turn_id")
            .map_err(|e| MemoryError::QueryFailed(format!("turn_id column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| MemoryError::QueryFailed(format!("timestamp column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| MemoryError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| MemoryError::QueryFailed(format!("content column: {e}")))?;
        let tool_calls_json: Option<String> = row
            .try_get("tool_calls")
            .map_err(|e| MemoryError::QueryFailed(format!("tool_calls column: {e}")))?;
        let thoughts: Option<String> = row
            .try_get("thoughts")
            .map_err(|e| MemoryError::QueryFailed(format!("thoughts column: {e}")))?;
        let embedding: Option<Vec<u8>> = row
            .try_get("embedding")
            .map_err(|e| MemoryError::QueryFailed(format!("embedding column: {e}")))?;

        let role = Role::from_str(&role_str)?;

        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MemoryError::CorruptRow {
                id,
                reason: format!("timestamp '{timestamp_str}': {e}"),
            })?;

        let tool_calls = tool_calls_json
            .map(|json| serde_json::from_str::<Vec<ToolCall>>(&json))
            .transpose()
            .map_err(|e| MemoryError::CorruptRow {
                id,
                reason: format!("tool_calls: {e}"),
            })?;

        Ok(StoredMessage {
            id,
            turn_id,
            timestamp,
            role,
            content,
            tool_calls,
            thoughts,
            embedding: embedding.map(|blob| vector::blob_to_embedding(&blob)),
        })
    }

    fn rows_to_messages(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<StoredMessage>, MemoryError> {
        rows.iter().map(Self::row_to_message).collect()
    }

    /// Escape `%`, `_` and the escape character itself for a LIKE pattern.
    fn escape_like(term: &str) -> String {
        let mut escaped = String::with_capacity(term.len());
        for c in term.chars() {
            if matches!(c, '%' | '_' | '\\') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }

    fn format_matches(term: &str, matches: &[StoredMessage]) -> String {
        if matches.is_empty() {
            return format!("No memories found matching '{term}'.");
        }

        matches
            .iter()
            .map(|m| {
                format!(
                    "--- Memory Found ---\nTurn ID: {}\nTimestamp: {}\nRole: {}\nContent: {}",
                    m.turn_id,
                    m.timestamp.to_rfc3339(),
                    m.role,
                    m.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl MemoryBackend for SqliteMemory {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn next_turn_id(&self) -> Result<TurnId, MemoryError> {
        let row = sqlx::query("SELECT COALESCE(MAX(turn_id), 0) + 1 AS next FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("next turn id: {e}")))?;

        row.try_get("next")
            .map_err(|e| MemoryError::QueryFailed(format!("next column: {e}")))
    }

    async fn append(&self, message: NewMessage) -> Result<i64, MemoryError> {
        if message.tool_calls.is_some() && message.role != Role::Assistant {
            return Err(MemoryError::ToolCallsOnNonAssistant(
                message.role.to_string(),
            ));
        }

        let tool_calls_json = message
            .tool_calls
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MemoryError::Storage(format!("tool_calls serialization: {e}")))?;

        // Embed before opening the transaction so the write stays short
        let embedding = if message.role.is_embedded() && !message.content.is_empty() {
            self.embed_checked(&message.content).await
        } else {
            None
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("BEGIN failed: {e}")))?;

        let result = sqlx::query(
            r#"
            INSERT INTO messages (turn_id, timestamp, role, content, tool_calls, thoughts)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(message.turn_id)
        .bind(Utc::now().to_rfc3339())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(tool_calls_json.as_deref())
        .bind(message.thoughts.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT message failed: {e}")))?;

        let id = result.last_insert_rowid();

        if let Some(ref vector) = embedding {
            sqlx::query(
                "INSERT INTO message_vectors (message_id, dimension, embedding) VALUES (?1, ?2, ?3)",
            )
            .bind(id)
            .bind(vector.len() as i64)
            .bind(vector::embedding_to_blob(vector))
            .execute(&mut *tx)
            .await
            .map_err(|e| MemoryError::Storage(format!("INSERT vector failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(
            id,
            turn_id = message.turn_id,
            role = %message.role,
            embedded = embedding.is_some(),
            "Appended message"
        );
        Ok(id)
    }

    async fn recent_context(&self, word_budget: usize) -> Result<Vec<ChatMessage>, MemoryError> {
        let rows = sqlx::query(&format!("{SELECT_MESSAGES} ORDER BY m.id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("recent context: {e}")))?;

        let messages: Vec<ChatMessage> = Self::rows_to_messages(&rows)?
            .iter()
            .map(|m| ChatMessage::new(m.role, m.folded_content()))
            .collect();

        Ok(select_within_word_budget(messages, word_budget))
    }

    async fn turn_records(&self, turn_id: TurnId) -> Result<Vec<StoredMessage>, MemoryError> {
        let rows = sqlx::query(&format!("{SELECT_MESSAGES} WHERE m.turn_id = ?1 ORDER BY m.id ASC"))
            .bind(turn_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("turn messages: {e}")))?;

        Self::rows_to_messages(&rows)
    }

    async fn prior_records(
        &self,
        before: TurnId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, MemoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_MESSAGES} WHERE m.turn_id < ?1 ORDER BY m.id DESC LIMIT ?2"
        ))
        .bind(before)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("prior history: {e}")))?;

        let mut messages = Self::rows_to_messages(&rows)?;
        messages.reverse();
        Ok(messages)
    }

    async fn similar(
        &self,
        query: &[f32],
        top_k: usize,
        max_distance: f32,
    ) -> Result<Vec<ScoredMessage>, MemoryError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "{SELECT_MESSAGES} WHERE v.dimension = ?1 ORDER BY m.id ASC"
        ))
        .bind(query.len() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("vector scan: {e}")))?;

        let candidates = Self::rows_to_messages(&rows)?;
        let results = vector::nearest(candidates, query, top_k, max_distance);
        debug!(candidates = rows.len(), hits = results.len(), "Similarity lookup");
        Ok(results)
    }

    async fn text_search(&self, term: &str) -> Result<String, MemoryError> {
        let pattern = format!("%{}%", Self::escape_like(term));

        let rows = sqlx::query(&format!(
            r#"{SELECT_MESSAGES}
            WHERE m.role IN ('user', 'assistant') AND m.content LIKE ?1 ESCAPE '\'
            ORDER BY m.id DESC
            LIMIT ?2"#
        ))
        .bind(&pattern)
        .bind(TEXT_SEARCH_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("text search: {e}")))?;

        let matches = Self::rows_to_messages(&rows)?;
        Ok(Self::format_matches(term, &matches))
    }

    async fn embed_query(&self, text: &str) -> Vec<f32> {
        self.embed_checked(text).await.unwrap_or_default()
    }

    async fn stats(&self) -> Result<MemoryStats, MemoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM messages) AS messages,
                (SELECT COUNT(*) FROM message_vectors) AS embedded,
                (SELECT MAX(turn_id) FROM messages) AS latest_turn_id
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("stats: {e}")))?;

        let messages: i64 = row
            .try_get("messages")
            .map_err(|e| MemoryError::QueryFailed(format!("messages column: {e}")))?;
        let embedded: i64 = row
            .try_get("embedded")
            .map_err(|e| MemoryError::QueryFailed(format!("embedded column: {e}")))?;
        let latest_turn_id: Option<i64> = row
            .try_get("latest_turn_id")
            .map_err(|e| MemoryError::QueryFailed(format!("latest_turn_id column: {e}")))?;

        Ok(MemoryStats {
            messages: messages as usize,
            embedded: embedded as usize,
            latest_turn_id,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("SQLite memory store closed");
    }
}
