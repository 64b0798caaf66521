//! The turn orchestrator at the heart of bashbot.
//!
//! Each user input opens a new turn that runs a bounded sequence of rounds:
//!
//! 1. **Assemble** the outbound messages from storage (recall, history, turn)
//! 2. **Stream** a generation from the model and fold the increments
//! 3. **Persist** exactly one assistant message for the round
//! 4. **If tool calls**: dispatch each, persist the results, loop back to 1
//! 5. **Otherwise** the turn is complete
//!
//! Every message is committed to memory as soon as it is final, so the
//! context for round N+1 is rebuilt from what round N wrote.

pub mod context;
pub mod loop_runner;
pub mod stream_event;
pub mod stream_state;

pub use context::{AssembledContext, ContextAssembler, HistoryPolicy};
pub use loop_runner::{AgentLoop, TurnOutcome, TurnStatus};
pub use stream_event::AgentEvent;
pub use stream_state::StreamState;
