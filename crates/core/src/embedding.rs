//! Embedder trait — converts text into a fixed-dimension vector.
//!
//! Embedding is best-effort: a failing backend yields an empty vector and
//! never an error, so a dead embedding service degrades similarity recall
//! instead of breaking the write path.

use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// A human-readable name (e.g., "ollama", "none").
    fn name(&self) -> &str;

    /// Embed `text`. Returns an empty vector on any failure.
    async fn embed(&self, text: &str) -> Vec<f32>;
}
