//! Ollama embedding client.
//!
//! `POST {host}/api/embeddings {model, prompt}` → `{embedding: [f32]}`.
//! Failures are logged and produce an empty vector; they never propagate.

use async_trait::async_trait;
use bashbot_core::embedding::Embedder;
use bashbot_core::error::ProviderError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }

    pub fn from_config(config: &bashbot_config::AppConfig) -> Result<Self, ProviderError> {
        Self::new(
            &config.ollama.host,
            &config.ollama.embedding_model,
            config.ollama.timeout_secs,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status_code: status,
                message,
            });
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse embedding response: {e}"),
            })?;

        Ok(parsed.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn embed(&self, text: &str) -> Vec<f32> {
        match self.request(text).await {
            Ok(vector) => {
                debug!(model = %self.model, dims = vector.len(), "Embedded text");
                vector
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "Embedding failed, continuing without vector");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(EmbeddingRequest {
            model: "nomic-embed-text:latest",
            prompt: "hello",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"model": "nomic-embed-text:latest", "prompt": "hello"})
        );
    }

    #[test]
    fn parse_response() {
        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"embedding": [0.1, -0.2, 0.3]}"#).unwrap();
        assert_eq!(parsed.embedding, vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn parse_response_without_embedding() {
        let parsed: EmbeddingResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.embedding.is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_yields_empty_vector() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let embedder = OllamaEmbedder::new(format!("http://{addr}"), "nomic-embed-text", 5).unwrap();
        assert!(embedder.embed("anything").await.is_empty());
    }
}
