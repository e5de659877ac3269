use super::{BackgroundJob, DurableQueue};
use crate::error::{Result, ToolRelayError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::io::SeekFrom;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

/// Append-only JSON-lines queue
///
/// Each push is flushed to disk before returning, so an acknowledged job
/// survives a process restart.
pub struct FileQueue {
    name: String,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileQueue {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every job in the file
    ///
    /// Lines that fail to parse (e.g. a torn final write) are skipped.
    pub async fn pending(&self) -> Result<Vec<BackgroundJob>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut jobs = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BackgroundJob>(line) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::warn!(
                        queue = %self.name,
                        line = index + 1,
                        error = %e,
                        "Skipping unreadable queue entry"
                    );
                }
            }
        }
        Ok(jobs)
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;

        // Terminate a torn final line so it cannot swallow this entry
        if file.metadata().await?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).await?;
            file.read_exact(&mut last).await?;
            if last[0] != b'\n' {
                file.write_all(b"\n").await?;
            }
        }

        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        file.sync_data().await
    }
}

#[async_trait]
impl DurableQueue for FileQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn push(&self, job: BackgroundJob) -> Result<String> {
        let line = serde_json::to_string(&job)?;

        let _guard = self.write_lock.lock().await;
        self.append(&line).await.map_err(|e| {
            ToolRelayError::Enqueue(format!(
                "failed to append to {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(queue = %self.name, job_id = %job.job_id, "Job persisted");
        Ok(job.job_id)
    }
}
