//! Unified tool registry

use super::catalog::Catalog;
use super::report::{DiscoveryReport, RegistryStats};
use crate::cache::CacheStore;
use crate::discovery::{ExternalServerAdapter, LocalRegistrationAdapter};
use crate::error::{Result, ToolRelayError};
use crate::tools::{ToolDescriptor, ToolType};
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// Cache key of the merged catalog
pub const CATALOG_CACHE_KEY: &str = "tool_registry:catalog";

/// Default catalog time-to-live
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Cache key of one source's descriptors
pub fn source_cache_key(source: &str) -> String {
    format!("tool_registry:source:{}", source)
}

/// A discovery source, in merge order
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    External(String),
    Local(String),
}

impl Source {
    fn name(&self) -> &str {
        match self {
            Source::External(name) | Source::Local(name) => name,
        }
    }
}

struct Snapshot {
    catalog: Arc<Catalog>,
    expires_at: Instant,
    stale: bool,
}

/// Merges external and local tools into one catalog
///
/// The catalog is held as an immutable snapshot; readers clone the `Arc`
/// and a refresh swaps in a newly built catalog. Merge order is fixed
/// (external servers in configuration order, then local registrations) and
/// a later source wins any name collision.
pub struct ToolRegistry {
    external: Option<Arc<dyn ExternalServerAdapter>>,
    local: Option<Arc<dyn LocalRegistrationAdapter>>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
    refresh_lock: Mutex<()>,
}

impl ToolRegistry {
    /// Create a registry with no sources
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            external: None,
            local: None,
            cache,
            ttl: DEFAULT_CACHE_TTL,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Set the external server adapter
    pub fn with_external_adapter(mut self, adapter: Arc<dyn ExternalServerAdapter>) -> Self {
        self.external = Some(adapter);
        self
    }

    /// Set the local registration adapter
    pub fn with_local_adapter(mut self, adapter: Arc<dyn LocalRegistrationAdapter>) -> Self {
        self.local = Some(adapter);
        self
    }

    /// Set the cache time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Cache time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Source names in merge order
    pub fn source_names(&self) -> Vec<String> {
        self.sources().iter().map(|s| s.name().to_string()).collect()
    }

    fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = self
            .external
            .as_ref()
            .map(|adapter| {
                adapter
                    .server_names()
                    .into_iter()
                    .map(Source::External)
                    .collect()
            })
            .unwrap_or_default();

        if let Some(local) = &self.local {
            sources.push(Source::Local(local.source_tag().to_string()));
        }
        sources
    }

    /// Run a full discovery cycle
    ///
    /// Never fails as a whole: a failing source contributes no tools and
    /// one entry in `errors`. With `force` the per-source cache is bypassed.
    pub async fn refresh(&self, force: bool) -> DiscoveryReport {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked(force).await
    }

    async fn refresh_locked(&self, force: bool) -> DiscoveryReport {
        let sources = self.sources();
        let mut report = DiscoveryReport {
            sources_checked: sources.len(),
            ..Default::default()
        };

        let results = join_all(sources.iter().map(|s| self.discover_source(s, force))).await;

        let mut catalog = Catalog::new();
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(descriptors) => {
                    report.sources_succeeded += 1;
                    merge_into(&mut catalog, descriptors, &mut report);
                }
                Err(e) => {
                    report.sources_failed += 1;
                    tracing::warn!(source = %source.name(), error = %e, "Tool discovery failed for source");
                    report.errors.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        report.tools_found = catalog.len();
        self.publish(catalog).await;

        tracing::info!(
            sources_checked = report.sources_checked,
            sources_failed = report.sources_failed,
            tools_found = report.tools_found,
            collisions = report.collisions.len(),
            force,
            "Tool discovery complete"
        );

        report
    }

    /// Re-discover a single source and rebuild the catalog around it
    ///
    /// The other sources keep the descriptors they contributed to the
    /// current catalog, including ones shadowed by a collision, and the
    /// merge runs again in source order. If discovery fails the catalog is
    /// left unchanged.
    pub async fn refresh_source(&self, source: &str, force: bool) -> DiscoveryReport {
        let mut report = DiscoveryReport {
            sources_checked: 1,
            ..Default::default()
        };

        let sources = self.sources();
        let Some(found) = sources.iter().find(|s| s.name() == source) else {
            report.sources_failed = 1;
            report.errors.push(format!("{}: unknown source", source));
            return report;
        };

        let _guard = self.refresh_lock.lock().await;
        let current = self.catalog_locked().await;

        match self.discover_source(found, force).await {
            Ok(descriptors) => {
                report.sources_succeeded = 1;
                let previous = current.from_source(source).len();

                let mut fresh = Some(descriptors);
                let mut catalog = Catalog::new();
                for s in &sources {
                    let tools = if s == found {
                        fresh.take().unwrap_or_default()
                    } else {
                        current.from_source(s.name())
                    };
                    merge_into(&mut catalog, tools, &mut report);
                }
                report.tools_found = catalog.len();

                tracing::info!(
                    source = %source,
                    previous,
                    tools_found = report.tools_found,
                    "Source refreshed"
                );
                self.publish(catalog).await;
            }
            Err(e) => {
                report.sources_failed = 1;
                report.tools_found = current.len();
                tracing::warn!(source = %source, error = %e, "Tool discovery failed for source");
                report.errors.push(format!("{}: {}", source, e));
            }
        }

        report
    }

    async fn discover_source(&self, source: &Source, force: bool) -> Result<Vec<ToolDescriptor>> {
        let key = source_cache_key(source.name());

        if !force {
            match self.cache.get(&key).await {
                Ok(Some(value)) => match serde_json::from_value::<Vec<ToolDescriptor>>(value) {
                    Ok(descriptors) => {
                        tracing::debug!(source = %source.name(), count = descriptors.len(), "Using cached source");
                        return Ok(descriptors);
                    }
                    Err(e) => {
                        tracing::warn!(source = %source.name(), error = %e, "Ignoring unreadable source cache");
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(source = %source.name(), error = %e, "Source cache unavailable");
                }
            }
        }

        let descriptors = match source {
            Source::External(server) => self.discover_external(server).await?,
            Source::Local(tag) => self.discover_local(tag).await?,
        };

        match serde_json::to_value(&descriptors) {
            Ok(value) => {
                if let Err(e) = self.cache.put(&key, value, self.ttl).await {
                    tracing::warn!(source = %source.name(), error = %e, "Failed to cache source tools");
                }
            }
            Err(e) => {
                tracing::warn!(source = %source.name(), error = %e, "Failed to serialize source tools");
            }
        }

        Ok(descriptors)
    }

    async fn discover_external(&self, server: &str) -> Result<Vec<ToolDescriptor>> {
        let adapter = self
            .external
            .as_ref()
            .ok_or_else(|| ToolRelayError::discovery(server, "no external adapter configured"))?;

        let mut discovery = adapter.discover(server).await?;
        if discovery.server_info.name != server {
            tracing::debug!(
                server = %server,
                reported = %discovery.server_info.name,
                "Attributing tools to configured server name"
            );
            discovery.server_info.name = server.to_string();
        }

        Ok(discovery.into_descriptors(adapter.requires_auth(server), adapter.category(server)))
    }

    async fn discover_local(&self, tag: &str) -> Result<Vec<ToolDescriptor>> {
        let adapter = self
            .local
            .as_ref()
            .ok_or_else(|| ToolRelayError::discovery(tag, "no local adapter configured"))?;

        let registrations = adapter.registrations().await?;
        Ok(registrations
            .into_iter()
            .map(|(event, registration)| registration.into_descriptor(&event, tag))
            .collect())
    }

    async fn publish(&self, catalog: Catalog) -> Arc<Catalog> {
        match serde_json::to_value(&catalog) {
            Ok(value) => {
                if let Err(e) = self.cache.put(CATALOG_CACHE_KEY, value, self.ttl).await {
                    tracing::warn!(error = %e, "Failed to persist tool catalog");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize tool catalog"),
        }

        self.swap(Arc::new(catalog), self.ttl).await
    }

    async fn swap(&self, catalog: Arc<Catalog>, lifetime: Duration) -> Arc<Catalog> {
        let mut snapshot = self.snapshot.write().await;
        *snapshot = Some(Snapshot {
            catalog: catalog.clone(),
            expires_at: Instant::now() + lifetime,
            stale: false,
        });
        catalog
    }

    async fn fresh_snapshot(&self) -> Option<Arc<Catalog>> {
        let snapshot = self.snapshot.read().await;
        snapshot
            .as_ref()
            .filter(|s| !s.stale && Instant::now() < s.expires_at)
            .map(|s| s.catalog.clone())
    }

    async fn last_snapshot(&self) -> Option<Arc<Catalog>> {
        self.snapshot.read().await.as_ref().map(|s| s.catalog.clone())
    }

    /// Current catalog
    ///
    /// Served from the in-memory snapshot while fresh, then from the
    /// persisted catalog, then by running discovery. A failing cache store
    /// falls back to the last snapshot (or an empty catalog).
    pub async fn get_all_tools(&self) -> Arc<Catalog> {
        if let Some(catalog) = self.fresh_snapshot().await {
            return catalog;
        }

        let _guard = self.refresh_lock.lock().await;
        self.catalog_locked().await
    }

    /// Catalog resolution with `refresh_lock` already held
    async fn catalog_locked(&self) -> Arc<Catalog> {
        // Another caller may have refreshed while we waited
        if let Some(catalog) = self.fresh_snapshot().await {
            return catalog;
        }

        match self.cache.get(CATALOG_CACHE_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<Catalog>(value) {
                Ok(catalog) => {
                    // Freshness counts from when the catalog was built, not loaded
                    let age = (Utc::now() - catalog.built_at())
                        .to_std()
                        .unwrap_or_default();
                    match self.ttl.checked_sub(age) {
                        Some(remaining) if !remaining.is_zero() => {
                            tracing::debug!(tools = catalog.len(), ?age, "Loaded persisted tool catalog");
                            return self.swap(Arc::new(catalog), remaining).await;
                        }
                        _ => tracing::debug!(?age, "Persisted tool catalog expired"),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable persisted catalog");
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Catalog cache unavailable, serving last snapshot");
                return self
                    .last_snapshot()
                    .await
                    .unwrap_or_else(|| Arc::new(Catalog::new()));
            }
        }

        self.refresh_locked(false).await;
        self.last_snapshot()
            .await
            .unwrap_or_else(|| Arc::new(Catalog::new()))
    }

    /// Tools of one type
    pub async fn get_tools_by_type(&self, tool_type: ToolType) -> Vec<ToolDescriptor> {
        self.get_all_tools().await.by_type(tool_type)
    }

    /// Case-insensitive substring search over name and description
    pub async fn search_tools(&self, query: &str) -> Vec<ToolDescriptor> {
        self.get_all_tools().await.search(query)
    }

    /// Look up one tool
    pub async fn get(&self, name: &str) -> Option<ToolDescriptor> {
        self.get_all_tools().await.get(name).cloned()
    }

    /// Catalog counts
    pub async fn get_stats(&self) -> RegistryStats {
        self.get_all_tools().await.stats()
    }

    /// Check that every requested tool exists before anything runs
    ///
    /// Returns descriptors in request order (duplicates collapsed), or
    /// `UnknownTools` naming exactly the missing ones.
    pub async fn validate_requested<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<ToolDescriptor>> {
        let catalog = self.get_all_tools().await;

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        let mut missing = Vec::new();

        for name in names {
            let name = name.as_ref();
            if !seen.insert(name) {
                continue;
            }
            match catalog.get(name) {
                Some(descriptor) => found.push(descriptor.clone()),
                None => missing.push(name.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(found)
        } else {
            Err(ToolRelayError::UnknownTools(missing))
        }
    }

    /// Drop persisted entries and mark the snapshot stale
    pub async fn invalidate(&self) -> Result<()> {
        self.cache.invalidate(CATALOG_CACHE_KEY).await?;
        for source in self.sources() {
            self.cache
                .invalidate(&source_cache_key(source.name()))
                .await?;
        }

        if let Some(snapshot) = self.snapshot.write().await.as_mut() {
            snapshot.stale = true;
        }

        tracing::debug!("Tool registry invalidated");
        Ok(())
    }
}

/// Merge one source's descriptors; later entries replace earlier ones
fn merge_into(catalog: &mut Catalog, descriptors: Vec<ToolDescriptor>, report: &mut DiscoveryReport) {
    for descriptor in descriptors {
        let name = descriptor.name.clone();
        let new_source = descriptor.source().to_string();

        if let Some(old) = catalog.insert(descriptor) {
            tracing::warn!(
                tool = %name,
                replaced = %old.source(),
                by = %new_source,
                "Tool name collision"
            );
            report
                .collisions
                .push(format!("{}: {} replaced by {}", name, old.source(), new_source));
            catalog.shadow(old);
        }
    }
}
