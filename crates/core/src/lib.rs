//! # bashbot core
//!
//! Domain types, traits, and error definitions for the bashbot agent.
//! This crate has **no framework dependencies**: it defines the domain model
//! that the storage, provider, tool and agent crates implement against.
//!
//! ## Layout
//!
//! - [`message`]: turns, roles, stored and outbound messages, word budgets
//! - [`provider`]: the streaming generation backend trait
//! - [`embedding`]: the text → vector trait used by memory
//! - [`memory`]: the turn-structured memory store trait
//! - [`tool`]: the capability trait invoked by the dispatcher

pub mod error;
pub mod message;
pub mod provider;
pub mod embedding;
pub mod tool;
pub mod memory;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{ChatMessage, NewMessage, Role, ScoredMessage, StoredMessage, ToolCall, TurnId};
pub use provider::{Provider, ProviderRequest, StreamChunk, ToolDefinition, Usage};
pub use embedding::Embedder;
pub use tool::{Tool, TOOL_ERROR_PREFIX, tool_error_message};
pub use memory::{MemoryBackend, MemoryStats};
