use crate::tools::{ExecutionContext, ListenerInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Unit of work handed to the background lane
///
/// Only this serialized record crosses the queue boundary; workers on the
/// other side need nothing else from the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub job_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub listener: ListenerInfo,
    pub arguments: Map<String, Value>,
    pub context: ExecutionContext,

    /// Stable hash of tool, arguments and conversation position
    pub dedupe_key: String,

    pub enqueued_at: DateTime<Utc>,
}

impl BackgroundJob {
    /// Build a job with a fresh id and computed dedupe key
    pub fn new(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        listener: ListenerInfo,
        arguments: Map<String, Value>,
        context: ExecutionContext,
    ) -> Self {
        let tool_name = tool_name.into();
        let dedupe_key = dedupe_key(&tool_name, &arguments, &context);
        Self {
            job_id: Uuid::new_v4().to_string(),
            call_id: call_id.into(),
            tool_name,
            listener,
            arguments,
            context,
            dedupe_key,
            enqueued_at: Utc::now(),
        }
    }

    /// Acknowledgment payload returned to the caller once queued
    pub fn acknowledgment(&self, queue: &str) -> Value {
        json!({
            "job_id": self.job_id,
            "queue": queue,
            "dedupe_key": self.dedupe_key,
            "enqueued_at": self.enqueued_at.to_rfc3339(),
        })
    }
}

/// SHA-256 over tool name, canonical arguments and message position
pub fn dedupe_key(
    tool_name: &str,
    arguments: &Map<String, Value>,
    context: &ExecutionContext,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update(b"\n");
    hasher.update(Value::Object(arguments.clone()).to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(context.conversation_id.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\n");
    hasher.update(context.message_id.as_deref().unwrap_or("").as_bytes());

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> ListenerInfo {
        ListenerInfo {
            source: "local_events".to_string(),
            event: "send_email".to_string(),
            listener: "EmailListener".to_string(),
        }
    }

    fn args(to: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("to".to_string(), json!(to));
        map
    }

    #[test]
    fn test_dedupe_key_is_stable() {
        let ctx = ExecutionContext::new().with_conversation_id("c1").with_message_id("m1");
        let a = BackgroundJob::new("call_1", "send_email", listener(), args("a@x"), ctx.clone());
        let b = BackgroundJob::new("call_2", "send_email", listener(), args("a@x"), ctx.clone());
        let c = BackgroundJob::new("call_3", "send_email", listener(), args("b@x"), ctx);

        assert_eq!(a.dedupe_key, b.dedupe_key);
        assert_ne!(a.dedupe_key, c.dedupe_key);
        assert_ne!(a.job_id, b.job_id);
        assert_eq!(a.dedupe_key.len(), 64);
        assert!(a.dedupe_key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_acknowledgment_shape() {
        let job = BackgroundJob::new("call_1", "send_email", listener(), args("a@x"), ExecutionContext::new());
        let ack = job.acknowledgment("tool_jobs");

        assert_eq!(ack["job_id"], job.job_id.as_str());
        assert_eq!(ack["queue"], "tool_jobs");
        assert_eq!(ack["dedupe_key"], job.dedupe_key.as_str());
        assert!(ack["enqueued_at"].is_string());
    }

    #[test]
    fn test_job_serialization_roundtrip() {
        let ctx = ExecutionContext::new().with_user_id("u1");
        let job = BackgroundJob::new("call_1", "send_email", listener(), args("a@x"), ctx);
        let line = serde_json::to_string(&job).unwrap();
        let parsed: BackgroundJob = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed.job_id, job.job_id);
        assert_eq!(parsed.listener, job.listener);
        assert_eq!(parsed.context.user_id.as_deref(), Some("u1"));
    }
}
