use super::report::RegistryStats;
use crate::tools::{ToolDescriptor, ToolType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Merged set of descriptors keyed by tool name
///
/// Immutable once published; a refresh builds a new catalog and swaps it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    tools: BTreeMap<String, ToolDescriptor>,
    /// Descriptors that lost a name collision to a later source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    shadowed: Vec<ToolDescriptor>,
    built_at: DateTime<Utc>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            shadowed: Vec::new(),
            built_at: Utc::now(),
        }
    }

    /// Insert a descriptor, returning the one it replaced
    pub fn insert(&mut self, descriptor: ToolDescriptor) -> Option<ToolDescriptor> {
        self.tools.insert(descriptor.name.clone(), descriptor)
    }

    /// Keep a descriptor that was replaced by a later source
    pub fn shadow(&mut self, descriptor: ToolDescriptor) {
        self.shadowed.push(descriptor);
    }

    /// Every descriptor attributed to `source`, shadowed ones included
    pub fn from_source(&self, source: &str) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .chain(self.shadowed.iter())
            .filter(|d| d.source() == source)
            .cloned()
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// When this catalog was assembled
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Descriptors in name order
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    /// Tool names in order
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|k| k.as_str()).collect()
    }

    /// Descriptors of one type
    pub fn by_type(&self, tool_type: ToolType) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .filter(|d| d.tool_type() == tool_type)
            .cloned()
            .collect()
    }

    /// Case-insensitive substring match over name and description
    pub fn search(&self, query: &str) -> Vec<ToolDescriptor> {
        let query = query.to_lowercase();
        self.tools
            .values()
            .filter(|d| {
                d.name.to_lowercase().contains(&query)
                    || d.description.to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }

    /// Counts by type and execution mode
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::empty();
        for descriptor in self.tools.values() {
            stats.total += 1;
            *stats.by_type.entry(descriptor.tool_type()).or_insert(0) += 1;
            *stats
                .by_execution_mode
                .entry(descriptor.execution_mode())
                .or_insert(0) += 1;
        }
        stats
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
