//! Generation and embedding backends for bashbot.
//!
//! Both talk to an Ollama server: the provider implements
//! `bashbot_core::Provider` over `/api/chat`, the embedder implements
//! `bashbot_core::Embedder` over `/api/embeddings`.

pub mod embedding;
pub mod model_info;
pub mod ollama;

pub use embedding::OllamaEmbedder;
pub use model_info::ModelInfo;
pub use ollama::OllamaProvider;
