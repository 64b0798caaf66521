//! Configuration loading and validation for bashbot.
//!
//! Loads configuration from `~/.bashbot/config.toml` with environment
//! variable overrides. Validates all settings at startup. The resulting
//! [`AppConfig`] is built once and handed to every constructor that needs it;
//! nothing below the CLI reads configuration on its own.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.bashbot/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation model served by Ollama
    #[serde(default = "default_model")]
    pub model: String,

    /// Ollama connection settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Memory store and context assembly
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool manifests
    #[serde(default)]
    pub tools: ToolsConfig,

    /// HTTP stub services
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_model() -> String {
    "bashbot".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_host")]
    pub host: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Connect and idle-read timeout, in seconds. Embedding and model-info
    /// calls also use it as a total deadline; chat streams do not.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text:latest".into()
}
fn default_timeout_secs() -> u64 {
    300
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Which rule selects prior-turn history for the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// The last `history_limit` messages before the current turn
    #[default]
    MessageCount,
    /// As many prior messages as fit in `context_word_limit` words
    WordBudget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Fixed dimension of every stored embedding
    #[serde(default = "default_dimension")]
    pub embedding_dimension: usize,

    /// Set to false to store messages without embeddings (disables recall)
    #[serde(default = "default_true")]
    pub embeddings_enabled: bool,

    #[serde(default)]
    pub history_mode: HistoryMode,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_context_word_limit")]
    pub context_word_limit: usize,

    #[serde(default = "default_recall_top_k")]
    pub recall_top_k: usize,

    #[serde(default = "default_recall_max_distance")]
    pub recall_max_distance: f32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("memory.db")
}
fn default_dimension() -> usize {
    768
}
fn default_true() -> bool {
    true
}
fn default_history_limit() -> usize {
    10
}
fn default_context_word_limit() -> usize {
    1800
}
fn default_recall_top_k() -> usize {
    5
}
fn default_recall_max_distance() -> f32 {
    1.0
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            embedding_dimension: default_dimension(),
            embeddings_enabled: true,
            history_mode: HistoryMode::default(),
            history_limit: default_history_limit(),
            context_word_limit: default_context_word_limit(),
            recall_top_k: default_recall_top_k(),
            recall_max_distance: default_recall_max_distance(),
        }
    }
}

impl MemoryConfig {
    /// SQLite connection URL for `db_path`.
    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.db_path.display())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on model calls per user turn
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
}

fn default_max_rounds() -> usize {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory of `*.json` tool manifests
    #[serde(default = "default_tools_dir")]
    pub dir: PathBuf,
}

fn default_tools_dir() -> PathBuf {
    PathBuf::from("manifests")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dir: default_tools_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            ollama: OllamaConfig::default(),
            memory: MemoryConfig::default(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.bashbot/config.toml).
    ///
    /// Environment variables override the file:
    /// - `BASHBOT_MODEL`
    /// - `BASHBOT_OLLAMA_HOST`
    /// - `BASHBOT_DB_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("BASHBOT_MODEL") {
            self.model = model;
        }
        if let Some(host) = lookup("BASHBOT_OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Some(path) = lookup("BASHBOT_DB_PATH") {
            self.memory.db_path = PathBuf::from(path);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".bashbot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        if self.memory.embedding_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "memory.embedding_dimension must be > 0".into(),
            ));
        }

        if self.memory.history_limit == 0 || self.memory.context_word_limit == 0 {
            return Err(ConfigError::ValidationError(
                "memory.history_limit and memory.context_word_limit must be > 0".into(),
            ));
        }

        if self.memory.recall_max_distance <= 0.0 {
            return Err(ConfigError::ValidationError(
                "memory.recall_max_distance must be > 0".into(),
            ));
        }

        if self.agent.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for bashbot_core::Error {
    fn from(err: ConfigError) -> Self {
        bashbot_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.model, "bashbot");
        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert_eq!(config.ollama.embedding_model, "nomic-embed-text:latest");
        assert_eq!(config.memory.context_word_limit, 1800);
        assert_eq!(config.memory.history_limit, 10);
        assert_eq!(config.agent.max_rounds, 5);
        assert_eq!(config.gateway.port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.memory.db_path, config.memory.db_path);
        assert_eq!(parsed.memory.history_mode, HistoryMode::MessageCount);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
model = "qwen3:8b"

[memory]
history_mode = "word_budget"
context_word_limit = 500
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model, "qwen3:8b");
        assert_eq!(config.memory.history_mode, HistoryMode::WordBudget);
        assert_eq!(config.memory.context_word_limit, 500);
        assert_eq!(config.memory.embedding_dimension, 768);
        assert_eq!(config.tools.dir, PathBuf::from("manifests"));
    }

    #[test]
    fn zero_rounds_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_distance_rejected() {
        let mut config = AppConfig::default();
        config.memory.recall_max_distance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().model, "bashbot");
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent]\nmax_rounds = 3\n").unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.max_rounds, 3);
    }

    #[test]
    fn load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [not toml").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("BASHBOT_MODEL", "llama3"),
            ("BASHBOT_OLLAMA_HOST", "http://gpu-box:11434"),
            ("BASHBOT_DB_PATH", "/var/lib/bashbot/memory.db"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.model, "llama3");
        assert_eq!(config.ollama.host, "http://gpu-box:11434");
        assert_eq!(
            config.memory.database_url(),
            "sqlite:/var/lib/bashbot/memory.db"
        );
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("bashbot"));
        assert!(toml_str.contains("nomic-embed-text"));
        assert!(toml_str.contains("8000"));
    }

    #[test]
    fn config_error_converts_to_core_error() {
        let err: bashbot_core::Error = ConfigError::ValidationError("bad".into()).into();
        assert!(err.to_string().contains("bad"));
    }
}
