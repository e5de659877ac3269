use super::{BackgroundJob, DurableQueue};
use crate::error::{Result, ToolRelayError};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// In-process queue for tests and embedding
pub struct InMemoryQueue {
    name: String,
    capacity: Option<usize>,
    jobs: Mutex<Vec<BackgroundJob>>,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: None,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Reject pushes once `capacity` jobs are held
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Snapshot of queued jobs in push order
    pub async fn jobs(&self) -> Vec<BackgroundJob> {
        self.jobs.lock().await.clone()
    }

    /// Remove and return all queued jobs
    pub async fn drain(&self) -> Vec<BackgroundJob> {
        std::mem::take(&mut *self.jobs.lock().await)
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

#[async_trait]
impl DurableQueue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, job: BackgroundJob) -> Result<String> {
        let mut jobs = self.jobs.lock().await;
        if let Some(capacity) = self.capacity {
            if jobs.len() >= capacity {
                return Err(ToolRelayError::Enqueue(format!(
                    "queue '{}' is full ({} jobs)",
                    self.name, capacity
                )));
            }
        }

        let job_id = job.job_id.clone();
        jobs.push(job);
        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ExecutionContext, ListenerInfo};
    use serde_json::Map;

    fn job(call_id: &str) -> BackgroundJob {
        BackgroundJob::new(
            call_id,
            "evt",
            ListenerInfo {
                source: "local_events".to_string(),
                event: "evt".to_string(),
                listener: "L".to_string(),
            },
            Map::new(),
            ExecutionContext::new(),
        )
    }

    #[tokio::test]
    async fn test_push_and_drain() {
        let queue = InMemoryQueue::new("jobs");
        let first = job("c1");
        let id = queue.push(first.clone()).await.unwrap();
        assert_eq!(id, first.job_id);
        queue.push(job("c2")).await.unwrap();

        let drained = queue.drain().await;
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].call_id, "c1");
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_capacity_rejects() {
        let queue = InMemoryQueue::new("jobs").with_capacity(1);
        queue.push(job("c1")).await.unwrap();
        let err = queue.push(job("c2")).await.unwrap_err();
        assert!(matches!(err, ToolRelayError::Enqueue(_)));
        assert_eq!(queue.len().await, 1);
    }
}
