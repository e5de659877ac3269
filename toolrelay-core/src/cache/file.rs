use super::CacheStore;
use crate::error::{Result, ToolRelayError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    expires_at: DateTime<Utc>,
    value: Value,
}

/// Cache store with one JSON file per key
///
/// Entries survive restarts, so a freshly started process can serve the
/// last catalog without rediscovering.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    root: PathBuf,
}

impl FileCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the cache files
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(ToolRelayError::Cache("cache key is empty".to_string()));
        }
        Ok(self.root.join(format!("{}.json", encode_key(key))))
    }

    async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            ToolRelayError::Cache(format!(
                "failed to create cache directory {}: {}",
                self.root.display(),
                e
            ))
        })
    }
}

/// Map a key to a file-safe name; every byte outside `[A-Za-z0-9_-]` is
/// percent-encoded so distinct keys never share a file.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{:02X}", byte);
        }
    }
    encoded
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ToolRelayError::Cache(format!(
                    "failed to read cache file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let entry: StoredEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable cache entry");
                let _ = tokio::fs::remove_file(&path).await;
                return Ok(None);
            }
        };

        if entry.expires_at <= Utc::now() {
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    async fn put(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let path = self.path_for(key)?;
        self.ensure_root().await?;

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ToolRelayError::Cache(format!("invalid ttl: {}", e)))?;
        let entry = StoredEntry {
            expires_at: Utc::now() + ttl,
            value,
        };
        let serialized = serde_json::to_vec_pretty(&entry)?;

        // Write-then-rename so readers never observe a partial file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized).await.map_err(|e| {
            ToolRelayError::Cache(format!("failed to write cache file {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            ToolRelayError::Cache(format!(
                "failed to replace cache file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ToolRelayError::Cache(format!(
                "failed to remove cache file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
