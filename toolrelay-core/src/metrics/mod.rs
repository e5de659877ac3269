//! Tool call statistics
//!
//! One entry is recorded per executed call, whichever lane handled it.

mod stats;

pub use stats::{CallOutcome, ExecutionStats, ExecutionStatsSnapshot, ToolCallStats};
