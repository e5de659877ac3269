//! Tool call execution
//!
//! [`ToolExecutor`] resolves each requested call against one catalog
//! snapshot and routes it by execution mode:
//!
//! - `immediate` calls go through an [`ImmediateLane`] under a timeout and
//!   the context's cancellation token
//! - `background` calls go through a [`BackgroundLane`], which only
//!   enqueues and returns an acknowledgment

#[allow(clippy::module_inception)]
mod executor;
mod lanes;

#[cfg(test)]
mod tests;

pub use executor::{ExecutorConfig, ToolExecutor, DEFAULT_MAX_CONCURRENCY, DEFAULT_TOOL_TIMEOUT};
pub use lanes::{AdapterImmediateLane, BackgroundLane, ImmediateLane, QueueBackgroundLane};
