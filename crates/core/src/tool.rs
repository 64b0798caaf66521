//! Tool trait — the abstraction over agent capabilities.
//!
//! A capability is the executable half of a tool; the declarative half (name,
//! description, parameter schema) lives in a JSON manifest. The registry
//! binds the two by name.

use async_trait::async_trait;

use crate::error::ToolError;
use crate::memory::MemoryBackend;

/// Prefix marking a tool-role message that reports a failure.
pub const TOOL_ERROR_PREFIX: &str = "[TOOL_ERROR]";

/// Render a failure as tool-role message content.
pub fn tool_error_message(description: impl std::fmt::Display) -> String {
    format!("{TOOL_ERROR_PREFIX} {description}")
}

/// The core Tool trait.
///
/// Each capability (memory_query, web_search, ...) implements this trait and
/// is registered in the ToolRegistry alongside its manifest.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool, matching the manifest and the name the
    /// model emits.
    fn name(&self) -> &str;

    /// Whether the dispatcher must hand this capability the memory store.
    /// Read once, at registration.
    fn requires_store(&self) -> bool {
        false
    }

    /// Execute the tool. `memory` is `Some` exactly when `requires_store()`
    /// was true at registration; model-supplied arguments never carry it.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        memory: Option<&dyn MemoryBackend>,
    ) -> std::result::Result<String, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(
            &self,
            arguments: serde_json::Value,
            _memory: Option<&dyn MemoryBackend>,
        ) -> std::result::Result<String, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("missing 'text'".into()))?;
            Ok(text.to_string())
        }
    }

    #[tokio::test]
    async fn echo_tool_executes() {
        let tool = EchoTool;
        assert!(!tool.requires_store());
        let out = tool
            .execute(serde_json::json!({"text": "hello world"}), None)
            .await
            .unwrap();
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn echo_tool_rejects_bad_arguments() {
        let err = EchoTool.execute(serde_json::json!({}), None).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn error_message_has_prefix() {
        assert_eq!(
            tool_error_message("No search term provided."),
            "[TOOL_ERROR] No search term provided."
        );
    }
}
