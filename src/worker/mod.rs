//! Worker system — polling loops that lease, execute, and report tasks.
//!
//! Core components:
//! - `state` — Loop state machine (Idle → Fetching → Leased → Executing → ...)
//! - `polling` — One handler's fetch → execute → report cycle
//! - `worker` — Handler registry running all loops concurrently

pub mod polling;
pub mod state;
pub mod worker;

pub use polling::HandlerLoop;
pub use state::{CycleOutcome, LoopState};
pub use worker::Worker;
