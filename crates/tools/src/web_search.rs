//! Web search tool — stub that returns a deterministic placeholder result.
//!
//! No network access: the result echoes the query so the agent loop and the
//! HTTP tool endpoint can be exercised end-to-end with stable output.

use async_trait::async_trait;
use bashbot_core::error::ToolError;
use bashbot_core::memory::MemoryBackend;
use bashbot_core::tool::Tool;
use serde::Serialize;

pub struct WebSearchTool;

#[derive(Debug, Serialize)]
struct SearchResults {
    results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _memory: Option<&dyn MemoryBackend>,
    ) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let results = SearchResults {
            results: vec![SearchResult {
                title: format!("Result for '{query}'"),
                url: format!("https://example.com/search?q={query}"),
                snippet: format!("Summary of {query}..."),
            }],
        };

        serde_json::to_string_pretty(&results).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}
