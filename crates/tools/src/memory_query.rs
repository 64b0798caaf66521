//! Memory query tool — lets the agent search its own conversation log.
//!
//! A thin wrapper over [`MemoryBackend::text_search`]: case-insensitive
//! substring match over past user and assistant messages, five most recent
//! hits. The store is injected by the dispatcher; the model only supplies
//! the search term.

use async_trait::async_trait;
use bashbot_core::error::ToolError;
use bashbot_core::memory::MemoryBackend;
use bashbot_core::tool::{Tool, tool_error_message};

pub struct MemoryQueryTool;

#[async_trait]
impl Tool for MemoryQueryTool {
    fn name(&self) -> &str {
        "memory_query"
    }

    fn requires_store(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        memory: Option<&dyn MemoryBackend>,
    ) -> Result<String, ToolError> {
        let memory = memory.ok_or_else(|| ToolError::StoreUnavailable(self.name().into()))?;

        let query = arguments["query"].as_str().unwrap_or_default().trim();
        if query.is_empty() {
            return Ok(tool_error_message("No search term provided."));
        }

        memory
            .text_search(query)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("An error occurred while searching memory: {e}"),
            })
    }
}
