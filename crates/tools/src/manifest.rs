//! Tool manifest loading.
//!
//! One JSON file per tool, in the function-calling shape the model expects.
//! Files are read once at startup, in file-name order, so the manifest list
//! sent to the model is stable between runs.

use bashbot_core::error::ToolError;
use bashbot_core::provider::ToolDefinition;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Load every `*.json` manifest in `dir`, sorted by file name.
///
/// A missing directory yields no manifests; an unreadable or malformed file
/// is an error.
pub fn load_manifests(dir: &Path) -> Result<Vec<ToolDefinition>, ToolError> {
    if !dir.exists() {
        warn!("Tool manifest directory {} not found, no tools loaded", dir.display());
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| ToolError::Manifest {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    paths.iter().map(|p| load_manifest(p)).collect()
}

/// Load a single manifest file.
pub fn load_manifest(path: &Path) -> Result<ToolDefinition, ToolError> {
    let content = std::fs::read_to_string(path).map_err(|e| ToolError::Manifest {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let definition: ToolDefinition =
        serde_json::from_str(&content).map_err(|e| ToolError::Manifest {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    if definition.name().trim().is_empty() {
        return Err(ToolError::Manifest {
            path: path.display().to_string(),
            reason: "function.name is empty".into(),
        });
    }

    debug!(tool = %definition.name(), path = %path.display(), "Loaded tool manifest");
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, file: &str, name: &str) {
        let manifest = serde_json::json!({
            "type": "function",
            "function": {
                "name": name,
                "description": format!("The {name} tool"),
                "parameters": {
                    "type": "object",
                    "properties": {"query": {"type": "string"}},
                    "required": ["query"]
                }
            }
        });
        std::fs::write(dir.join(file), manifest.to_string()).unwrap();
    }

    #[test]
    fn loads_json_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "web_search.json", "web_search");
        write(dir.path(), "memory_query.json", "memory_query");
        std::fs::write(dir.path().join("README.md"), "not a manifest").unwrap();

        let manifests = load_manifests(dir.path()).unwrap();
        let names: Vec<&str> = manifests.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["memory_query", "web_search"]);
        assert_eq!(manifests[0].required_arguments(), vec!["query"]);
    }

    #[test]
    fn missing_directory_is_empty() {
        let manifests = load_manifests(Path::new("/nonexistent/manifests")).unwrap();
        assert!(manifests.is_empty());
    }

    #[test]
    fn malformed_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{\"function\": 3}").unwrap();
        let err = load_manifests(dir.path()).unwrap_err();
        assert!(matches!(err, ToolError::Manifest { .. }));
    }

    #[test]
    fn empty_name_is_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "blank.json", " ");
        assert!(load_manifests(dir.path()).is_err());
    }
}
