//! Durable queues for background tool calls
//!
//! The background lane only appends; what consumes the queue is outside
//! this crate.

mod file;
mod job;
mod memory;

pub use file::FileQueue;
pub use job::{dedupe_key, BackgroundJob};
pub use memory::InMemoryQueue;

use crate::error::Result;
use async_trait::async_trait;

/// Append-only job queue
#[async_trait]
pub trait DurableQueue: Send + Sync {
    /// Queue name reported in acknowledgments
    fn name(&self) -> &str;

    /// Persist a job and return its id
    async fn push(&self, job: BackgroundJob) -> Result<String>;
}
