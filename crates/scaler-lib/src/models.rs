//! Core data models for the capacity scaler

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// CPU usage for a single node, in millicores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStat {
    pub used_millis: i64,
    pub allocatable_millis: i64,
    /// None when the node reports zero allocatable CPU
    pub percent: Option<f64>,
}

/// Memory usage for a single node, in bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStat {
    pub used_bytes: i64,
    /// Allocatable memory as reported by the node status
    pub available_bytes: i64,
    pub percent: Option<f64>,
}

/// Ephemeral-storage usage for a single node, in bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStat {
    pub used_bytes: i64,
    /// Allocatable minus used, floored at zero
    pub available_bytes: i64,
    pub percent: Option<f64>,
}

/// Pod count on a node for one workload namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePodCount {
    pub namespace: String,
    pub count: usize,
}

/// Utilization snapshot for one cluster node
///
/// Recomputed wholesale on every poll; there is no diffing against the
/// previous snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub cpu: CpuStat,
    pub memory: MemoryStat,
    pub storage: StorageStat,
    pub pods: Vec<NamespacePodCount>,
    pub observed_at: i64,
}

/// Pending-job backlog for one instance group of the job platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobBacklogEntry {
    pub group: String,
    pub count: u64,
}

/// The latest-known pair of source snapshots handed to the decision policy
///
/// Only ever constructed once both sources have delivered at least one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleDecisionInput {
    pub nodes: Vec<NodeSnapshot>,
    pub backlog: Vec<JobBacklogEntry>,
}

/// Identity of a machine set (name + namespace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSetRef {
    pub name: String,
    pub namespace: String,
}

impl MachineSetRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Identity of a single machine backing a cluster node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRef {
    pub name: String,
    pub namespace: String,
}

impl MachineRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Output of the decision policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleAction {
    /// No change to fleet capacity
    Hold,
    /// Grow the machine set by one replica
    ScaleUp { machine_set: MachineSetRef },
    /// Remove one concrete machine and shrink the machine set by one replica
    ScaleDown {
        machine_set: MachineSetRef,
        node_name: String,
        machine: MachineRef,
    },
}

/// Percentage of `allocatable` consumed by `used`
///
/// Returns None on a zero or negative allocatable so that a misreporting
/// node can never propagate infinity or NaN into a snapshot.
pub fn percent_of(used: i64, allocatable: i64) -> Option<f64> {
    if allocatable <= 0 {
        return None;
    }
    Some(used as f64 / allocatable as f64 * 100.0)
}

/// Split a comma-separated name list from the environment
///
/// Entries are trimmed and empties dropped; an input that yields no names is
/// a configuration error.
pub fn parse_name_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if names.is_empty() {
        return Err(ConfigError::EmptyNameList {
            raw: raw.to_string(),
        });
    }
    Ok(names)
}
