use crate::tools::{ExecutionMode, ToolType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one discovery cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub sources_checked: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub tools_found: usize,

    /// One entry per failed source
    pub errors: Vec<String>,

    /// One entry per name collision, `"<name>: <old> replaced by <new>"`
    pub collisions: Vec<String>,
}

impl DiscoveryReport {
    /// Whether every checked source succeeded
    pub fn is_complete(&self) -> bool {
        self.sources_failed == 0
    }
}

/// Catalog counts
///
/// Both maps always hold every variant, zero when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: usize,
    pub by_type: BTreeMap<ToolType, usize>,
    pub by_execution_mode: BTreeMap<ExecutionMode, usize>,
}

impl RegistryStats {
    /// Stats for an empty catalog
    pub fn empty() -> Self {
        Self {
            total: 0,
            by_type: ToolType::all().iter().map(|t| (*t, 0)).collect(),
            by_execution_mode: ExecutionMode::all().iter().map(|m| (*m, 0)).collect(),
        }
    }
}

impl Default for RegistryStats {
    fn default() -> Self {
        Self::empty()
    }
}
