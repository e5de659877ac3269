//! Tool registry
//!
//! Merges the output of every discovery adapter into one [`Catalog`],
//! persists it through a [`CacheStore`](crate::cache::CacheStore) and serves
//! lookup, search, stats and pre-flight validation from it.

mod catalog;
#[allow(clippy::module_inception)]
mod registry;
mod report;


pub use catalog::Catalog;
pub use registry::{source_cache_key, ToolRegistry, CATALOG_CACHE_KEY, DEFAULT_CACHE_TTL};
pub use report::{DiscoveryReport, RegistryStats};
