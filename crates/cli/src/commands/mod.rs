//! Subcommand implementations and the shared startup wiring.

pub mod agent;
pub mod memory;
pub mod model_info;
pub mod run_tool;
pub mod serve;

use bashbot_config::AppConfig;
use bashbot_core::embedding::Embedder;
use bashbot_memory::{NoopEmbedder, SqliteMemory};
use bashbot_providers::OllamaEmbedder;
use bashbot_tools::ToolRegistry;
use std::sync::Arc;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// The embedder the store uses: Ollama, or none when embeddings are off.
pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, Box<dyn std::error::Error>> {
    if config.memory.embeddings_enabled {
        Ok(Arc::new(OllamaEmbedder::from_config(config)?))
    } else {
        Ok(Arc::new(NoopEmbedder))
    }
}

pub async fn open_memory(config: &AppConfig) -> Result<Arc<SqliteMemory>, Box<dyn std::error::Error>> {
    let embedder = build_embedder(config)?;
    let memory = SqliteMemory::from_config(config, embedder)
        .await
        .map_err(|e| format!("Failed to open {}: {e}", config.memory.db_path.display()))?;
    Ok(Arc::new(memory))
}

pub fn load_tools(config: &AppConfig) -> Result<Arc<ToolRegistry>, Box<dyn std::error::Error>> {
    Ok(Arc::new(bashbot_tools::default_registry(&config.tools.dir)?))
}
