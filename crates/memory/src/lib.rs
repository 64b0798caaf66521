//! Memory store implementations for bashbot.

pub mod noop;
pub mod sqlite;
pub mod vector;

pub use noop::NoopEmbedder;
pub use sqlite::SqliteMemory;
pub use vector::{l2_distance, nearest};
