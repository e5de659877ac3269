//! Execution lanes
//!
//! The executor routes each resolved call to exactly one lane based on the
//! descriptor's execution mode.

use crate::discovery::ExternalServerAdapter;
use crate::error::{Result, ToolRelayError};
use crate::queue::{BackgroundJob, DurableQueue};
use crate::tools::{ExecutionContext, ToolDescriptor, ToolOrigin};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Synchronous invocation of external tools
#[async_trait]
pub trait ImmediateLane: Send + Sync {
    /// Call the tool and return its functional result
    async fn invoke(
        &self,
        descriptor: &ToolDescriptor,
        arguments: Map<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Value>;
}

/// Durable hand-off of local event tools
#[async_trait]
pub trait BackgroundLane: Send + Sync {
    /// Enqueue the call and return an acknowledgment payload
    async fn enqueue(
        &self,
        call_id: &str,
        descriptor: &ToolDescriptor,
        arguments: Map<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Value>;
}

/// Immediate lane that calls through the external server adapter
pub struct AdapterImmediateLane {
    adapter: Arc<dyn ExternalServerAdapter>,
}

impl AdapterImmediateLane {
    pub fn new(adapter: Arc<dyn ExternalServerAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl ImmediateLane for AdapterImmediateLane {
    async fn invoke(
        &self,
        descriptor: &ToolDescriptor,
        arguments: Map<String, Value>,
        _context: &ExecutionContext,
    ) -> Result<Value> {
        match &descriptor.origin {
            ToolOrigin::ExternalTool { server } => {
                self.adapter
                    .invoke(&server.name, &descriptor.name, arguments)
                    .await
            }
            ToolOrigin::LocalEvent { .. } => Err(ToolRelayError::InvalidRequest(format!(
                "'{}' is a local event and cannot be invoked immediately",
                descriptor.name
            ))),
        }
    }
}

/// Background lane that appends jobs to a durable queue
pub struct QueueBackgroundLane {
    queue: Arc<dyn DurableQueue>,
}

impl QueueBackgroundLane {
    pub fn new(queue: Arc<dyn DurableQueue>) -> Self {
        Self { queue }
    }

    /// Name of the underlying queue
    pub fn queue_name(&self) -> &str {
        self.queue.name()
    }
}

#[async_trait]
impl BackgroundLane for QueueBackgroundLane {
    async fn enqueue(
        &self,
        call_id: &str,
        descriptor: &ToolDescriptor,
        arguments: Map<String, Value>,
        context: &ExecutionContext,
    ) -> Result<Value> {
        let listener = match &descriptor.origin {
            ToolOrigin::LocalEvent { listener } => listener.clone(),
            ToolOrigin::ExternalTool { .. } => {
                return Err(ToolRelayError::InvalidRequest(format!(
                    "'{}' is an external tool and cannot be queued",
                    descriptor.name
                )));
            }
        };

        let job = BackgroundJob::new(
            call_id,
            &descriptor.name,
            listener,
            arguments,
            context.clone(),
        );
        let acknowledgment = job.acknowledgment(self.queue.name());

        self.queue.push(job).await.map_err(|e| match e {
            ToolRelayError::Enqueue(_) => e,
            other => ToolRelayError::Enqueue(other.to_string()),
        })?;

        Ok(acknowledgment)
    }
}
