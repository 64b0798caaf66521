//! Tool manifests, the tool registry, and built-in capabilities for bashbot.
//!
//! Tools give the agent the ability to look things up:
//! search its own conversation log and (as a placeholder) the web.

pub mod manifest;
pub mod memory_query;
pub mod registry;
pub mod web_search;

use bashbot_core::error::ToolError;
use bashbot_core::tool::Tool;
use std::path::Path;
use std::sync::Arc;

pub use manifest::{load_manifest, load_manifests};
pub use memory_query::MemoryQueryTool;
pub use registry::ToolRegistry;
pub use web_search::WebSearchTool;

/// All built-in capabilities.
pub fn builtin_capabilities() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(MemoryQueryTool), Arc::new(WebSearchTool)]
}

/// Create the default registry: manifests from `manifest_dir` bound to the
/// built-in capabilities.
pub fn default_registry(manifest_dir: &Path) -> Result<ToolRegistry, ToolError> {
    let manifests = load_manifests(manifest_dir)?;
    ToolRegistry::from_manifests(manifests, builtin_capabilities())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn repo_manifests() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../manifests")
    }

    #[test]
    fn shipped_manifests_bind_to_builtins() {
        let registry = default_registry(&repo_manifests()).unwrap();
        assert_eq!(registry.names(), vec!["memory_query", "web_search"]);
        let advertised: Vec<&str> = registry.definitions().iter().map(|d| d.name()).collect();
        assert_eq!(advertised, vec!["memory_query", "web_search"]);
    }

    #[tokio::test]
    async fn run_single_web_search_uses_manifest_argument() {
        let registry = default_registry(&repo_manifests()).unwrap();
        let out = registry.run_single("web_search", "ownership", None).await;
        assert!(out.contains("Result for 'ownership'"));
    }
}
