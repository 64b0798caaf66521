//! Context assembly for a single model call.
//!
//! # Layers (in outbound order)
//!
//! | Layer | Source | Trim Strategy |
//! |-------|--------|---------------|
//! | 1. Recall | Vector similarity over past messages | `top_k`, distance cutoff, dedup |
//! | 2. History | Prior turns | Message count or word budget |
//! | 3. Turn | The in-progress turn | Never trimmed |

pub mod assembler;

pub use assembler::{AssembledContext, ContextAssembler, HistoryPolicy, RECALL_HEADER};
