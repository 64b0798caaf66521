//! No-op embedder — stores messages without vectors, disabling recall.

use async_trait::async_trait;
use bashbot_core::embedding::Embedder;

/// An embedder that never produces a vector.
pub struct NoopEmbedder;

#[async_trait]
impl Embedder for NoopEmbedder {
    fn name(&self) -> &str {
        "none"
    }

    async fn embed(&self, _text: &str) -> Vec<f32> {
        Vec::new()
    }
}
