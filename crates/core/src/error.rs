//! Error types for the bashbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum:
//!
//! - [`ProviderError`]: transport failures talking to the generation backend.
//!   These abort the current turn.
//! - [`ToolError`]: unknown tools, bad arguments, failing capabilities. The
//!   dispatcher turns these into `[TOOL_ERROR]` tool messages.
//! - [`MemoryError`]: contract violations and storage failures. Fail fast.

use thiserror::Error;

/// The top-level error type for all bashbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed stream increment: {0}")]
    MalformedChunk(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Invalid role: '{0}' (expected user, assistant, tool or system)")]
    InvalidRole(String),

    #[error("Tool calls may only be attached to assistant messages, got role '{0}'")]
    ToolCallsOnNonAssistant(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Corrupt stored data in message {id}: {reason}")]
    CorruptRow { id: i64, reason: String },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' not found.")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool '{0}' requires the memory store but none was provided")]
    StoreUnavailable(String),

    #[error("Manifest error in {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("Manifest for '{manifest}' does not match capability '{capability}'")]
    NameMismatch { manifest: String, capability: String },
}
