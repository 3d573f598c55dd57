//! Pluggable scale-decision policy
//!
//! The policy maps the latest pair of source snapshots to a scale action.
//! The shipped implementation only reports what it sees and holds:
//! choosing actual utilization/backlog thresholds is the integrator's
//! decision, made by substituting another implementation at wiring time.

use tracing::info;

use crate::models::{ScaleAction, ScaleDecisionInput};

/// Maps observed utilization + backlog to a scale action
pub trait DecisionPolicy: Send + Sync {
    fn decide(&self, input: &ScaleDecisionInput) -> ScaleAction;
}

/// Logs every observed value and never scales
pub struct ObserveOnlyPolicy;

impl DecisionPolicy for ObserveOnlyPolicy {
    fn decide(&self, input: &ScaleDecisionInput) -> ScaleAction {
        for node in &input.nodes {
            info!(
                node = %node.name,
                cpu_used_millis = node.cpu.used_millis,
                cpu_allocatable_millis = node.cpu.allocatable_millis,
                cpu_percent = ?node.cpu.percent,
                memory_used_bytes = node.memory.used_bytes,
                memory_available_bytes = node.memory.available_bytes,
                memory_percent = ?node.memory.percent,
                storage_free_bytes = node.storage.available_bytes,
                pods = ?node.pods,
                "Node utilization"
            );
        }
        for entry in &input.backlog {
            info!(
                instance_group = %entry.group,
                pending = entry.count,
                "Pending-job backlog"
            );
        }
        ScaleAction::Hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CpuStat, JobBacklogEntry, MemoryStat, NodeSnapshot, StorageStat};

    fn sample_input() -> ScaleDecisionInput {
        ScaleDecisionInput {
            nodes: vec![NodeSnapshot {
                name: "n1".to_string(),
                cpu: CpuStat {
                    used_millis: 800,
                    allocatable_millis: 1000,
                    percent: Some(80.0),
                },
                memory: MemoryStat {
                    used_bytes: 1,
                    available_bytes: 2,
                    percent: Some(50.0),
                },
                storage: StorageStat {
                    used_bytes: 0,
                    available_bytes: 1,
                    percent: Some(0.0),
                },
                pods: vec![],
                observed_at: 0,
            }],
            backlog: vec![JobBacklogEntry {
                group: "grp-a".to_string(),
                count: 12,
            }],
        }
    }

    #[test]
    fn test_observe_only_policy_always_holds() {
        let policy = ObserveOnlyPolicy;
        assert_eq!(policy.decide(&sample_input()), ScaleAction::Hold);

        let empty = ScaleDecisionInput {
            nodes: vec![],
            backlog: vec![],
        };
        assert_eq!(policy.decide(&empty), ScaleAction::Hold);
    }
}
