//! Scale actuation against the fleet's machine sets
//!
//! Scale-up is a single replica increment. Scale-down is a sequential
//! state machine: cordon the node, wait a fixed drain delay, mark the
//! machine with the deletion-intent annotation, then decrement the
//! replica count. Steps abort on first failure and completed side effects
//! are left in place; the phase reached is reported so operators can see
//! exactly how far a partial removal got.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::cluster::{ClusterApi, DELETE_MACHINE_ANNOTATION};
use crate::error::{ClusterError, ScaleDownError};
use crate::models::{MachineRef, MachineSetRef, ScaleAction};
use crate::observability::ScalerMetrics;

/// Fixed delay between cordoning a node and marking its machine, giving
/// workloads time to evacuate. A timer heuristic, not a completion check.
pub const DEFAULT_DRAIN_WAIT: Duration = Duration::from_secs(60);

/// Progress of one machine through the scale-down state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPhase {
    /// Nothing applied yet
    Active,
    /// Node marked unschedulable
    Cordoned,
    /// Deletion-intent annotation written to the machine
    DeletionMarked,
    /// Machine set replica count decremented
    CapacityReduced,
}

/// Executes scale actions against the cluster
pub struct ScaleActuator {
    cluster: Arc<dyn ClusterApi>,
    drain_wait: Duration,
    metrics: ScalerMetrics,
}

impl ScaleActuator {
    pub fn new(cluster: Arc<dyn ClusterApi>, metrics: ScalerMetrics) -> Self {
        Self {
            cluster,
            drain_wait: DEFAULT_DRAIN_WAIT,
            metrics,
        }
    }

    /// Override the drain delay (tests use milliseconds)
    pub fn with_drain_wait(mut self, drain_wait: Duration) -> Self {
        self.drain_wait = drain_wait;
        self
    }

    /// Execute a policy action, recording the outcome
    pub async fn execute(&self, action: ScaleAction) {
        match action {
            ScaleAction::Hold => {}
            ScaleAction::ScaleUp { machine_set } => match self.scale_up(&machine_set).await {
                Ok(replicas) => {
                    self.metrics.record_scale_up("ok");
                    info!(machine_set = %machine_set.name, replicas, "Scale-up complete");
                }
                Err(e) => {
                    self.metrics.record_scale_up("error");
                    warn!(machine_set = %machine_set.name, error = %e, "Scale-up failed");
                }
            },
            ScaleAction::ScaleDown {
                machine_set,
                node_name,
                machine,
            } => match self.scale_down(&machine_set, &node_name, &machine).await {
                Ok(phase) => {
                    self.metrics.record_scale_down("ok");
                    info!(
                        machine_set = %machine_set.name,
                        node = %node_name,
                        phase = ?phase,
                        "Scale-down complete"
                    );
                }
                Err(e) => {
                    self.metrics.record_scale_down("error");
                    warn!(
                        machine_set = %machine_set.name,
                        node = %node_name,
                        phase = ?e.phase,
                        error = %e,
                        "Scale-down aborted"
                    );
                }
            },
        }
    }

    /// Increment the machine set's replica count by exactly one
    ///
    /// Read-modify-write with no conflict guard. Not idempotent: two
    /// invocations grow the fleet by two.
    pub async fn scale_up(&self, machine_set: &MachineSetRef) -> Result<i32, ClusterError> {
        let current = self
            .cluster
            .get_machine_set(machine_set)
            .await?
            .ok_or_else(|| ClusterError::ReplicasUnset {
                name: machine_set.name.clone(),
            })?;

        let target = current + 1;
        self.cluster
            .update_machine_set_replicas(machine_set, target)
            .await?;

        info!(
            machine_set = %machine_set.name,
            replicas = target,
            "Scaled up machine set"
        );
        Ok(target)
    }

    /// Remove one machine's worth of capacity
    ///
    /// Sequential and abort-on-first-failure; completed steps are never
    /// rolled back. Marking the specific machine before decrementing the
    /// replica count keeps the cluster's reconciler from replacing the
    /// machine being removed.
    pub async fn scale_down(
        &self,
        machine_set: &MachineSetRef,
        node_name: &str,
        machine: &MachineRef,
    ) -> Result<RemovalPhase, ScaleDownError> {
        let mut phase = RemovalPhase::Active;

        self.cluster
            .cordon_node(node_name)
            .await
            .map_err(|source| ScaleDownError { phase, source })?;
        phase = RemovalPhase::Cordoned;
        info!(node = %node_name, "Node cordoned; waiting for workloads to drain");

        sleep(self.drain_wait).await;

        self.cluster
            .annotate_machine(machine, DELETE_MACHINE_ANNOTATION, "true")
            .await
            .map_err(|source| ScaleDownError { phase, source })?;
        phase = RemovalPhase::DeletionMarked;
        info!(machine = %machine.name, "Machine marked for deletion");

        let replicas = self
            .cluster
            .get_machine_set(machine_set)
            .await
            .map_err(|source| ScaleDownError { phase, source })?;

        match replicas {
            Some(current) if current > 0 => {
                self.cluster
                    .update_machine_set_replicas(machine_set, current - 1)
                    .await
                    .map_err(|source| ScaleDownError { phase, source })?;
                phase = RemovalPhase::CapacityReduced;
                info!(
                    machine_set = %machine_set.name,
                    replicas = current - 1,
                    "Scaled down machine set"
                );
            }
            _ => {
                info!(
                    machine_set = %machine_set.name,
                    "Machine set already at 0 replicas"
                );
            }
        }

        Ok(phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{async_trait, NodeInfo, ResourceTotals};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Which cluster operation should fail
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum FailAt {
        Nothing,
        Cordon,
        Annotate,
        UpdateReplicas,
    }

    #[derive(Debug, Default)]
    struct ClusterState {
        replicas: Option<i32>,
        cordoned: Vec<String>,
        annotations: HashMap<String, String>,
    }

    struct MockCluster {
        state: Mutex<ClusterState>,
        fail_at: FailAt,
    }

    impl MockCluster {
        fn with_replicas(replicas: Option<i32>) -> Self {
            Self {
                state: Mutex::new(ClusterState {
                    replicas,
                    ..ClusterState::default()
                }),
                fail_at: FailAt::Nothing,
            }
        }

        fn failing_at(mut self, fail_at: FailAt) -> Self {
            self.fail_at = fail_at;
            self
        }

        fn replicas(&self) -> Option<i32> {
            self.state.lock().unwrap().replicas
        }

        fn is_cordoned(&self, node: &str) -> bool {
            self.state
                .lock()
                .unwrap()
                .cordoned
                .contains(&node.to_string())
        }

        fn annotation(&self, key: &str) -> Option<String> {
            self.state.lock().unwrap().annotations.get(key).cloned()
        }
    }

    #[async_trait]
    impl ClusterApi for MockCluster {
        async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError> {
            Ok(vec![])
        }

        async fn node_usage(&self, node: &str) -> Result<ResourceTotals, ClusterError> {
            Err(ClusterError::NotFound {
                kind: "NodeMetrics",
                name: node.to_string(),
            })
        }

        async fn pods_on_node(&self, _node: &str, _ns: &str) -> Result<usize, ClusterError> {
            Ok(0)
        }

        async fn cordon_node(&self, node: &str) -> Result<(), ClusterError> {
            if self.fail_at == FailAt::Cordon {
                return Err(ClusterError::NotFound {
                    kind: "Node",
                    name: node.to_string(),
                });
            }
            self.state.lock().unwrap().cordoned.push(node.to_string());
            Ok(())
        }

        async fn get_machine_set(
            &self,
            _machine_set: &MachineSetRef,
        ) -> Result<Option<i32>, ClusterError> {
            Ok(self.state.lock().unwrap().replicas)
        }

        async fn update_machine_set_replicas(
            &self,
            machine_set: &MachineSetRef,
            replicas: i32,
        ) -> Result<(), ClusterError> {
            if self.fail_at == FailAt::UpdateReplicas {
                return Err(ClusterError::Conflict {
                    kind: "MachineSet",
                    name: machine_set.name.clone(),
                });
            }
            self.state.lock().unwrap().replicas = Some(replicas);
            Ok(())
        }

        async fn annotate_machine(
            &self,
            machine: &MachineRef,
            key: &str,
            value: &str,
        ) -> Result<(), ClusterError> {
            if self.fail_at == FailAt::Annotate {
                return Err(ClusterError::NotFound {
                    kind: "Machine",
                    name: machine.name.clone(),
                });
            }
            self.state
                .lock()
                .unwrap()
                .annotations
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    fn actuator_for(cluster: Arc<MockCluster>) -> ScaleActuator {
        ScaleActuator::new(cluster, ScalerMetrics::new())
            .with_drain_wait(Duration::from_millis(1))
    }

    fn machine_set() -> MachineSetRef {
        MachineSetRef::new("workers-east", "openshift-machine-api")
    }

    fn machine() -> MachineRef {
        MachineRef::new("workers-east-abc12", "openshift-machine-api")
    }

    #[tokio::test]
    async fn test_scale_up_increments_by_one() {
        let cluster = Arc::new(MockCluster::with_replicas(Some(3)));
        let actuator = actuator_for(cluster.clone());

        let replicas = actuator.scale_up(&machine_set()).await.unwrap();
        assert_eq!(replicas, 4);
        assert_eq!(cluster.replicas(), Some(4));
    }

    #[tokio::test]
    async fn test_scale_up_is_not_idempotent() {
        let cluster = Arc::new(MockCluster::with_replicas(Some(3)));
        let actuator = actuator_for(cluster.clone());

        actuator.scale_up(&machine_set()).await.unwrap();
        actuator.scale_up(&machine_set()).await.unwrap();

        assert_eq!(cluster.replicas(), Some(5));
    }

    #[tokio::test]
    async fn test_scale_up_with_unset_replicas_is_an_error() {
        let cluster = Arc::new(MockCluster::with_replicas(None));
        let actuator = actuator_for(cluster.clone());

        let err = actuator.scale_up(&machine_set()).await.unwrap_err();
        assert!(matches!(err, ClusterError::ReplicasUnset { .. }));
        assert_eq!(cluster.replicas(), None);
    }

    #[tokio::test]
    async fn test_scale_down_happy_path_runs_all_phases() {
        let cluster = Arc::new(MockCluster::with_replicas(Some(3)));
        let actuator = actuator_for(cluster.clone());

        let phase = actuator
            .scale_down(&machine_set(), "node-1", &machine())
            .await
            .unwrap();

        assert_eq!(phase, RemovalPhase::CapacityReduced);
        assert_eq!(cluster.replicas(), Some(2));
        assert!(cluster.is_cordoned("node-1"));
        assert_eq!(
            cluster.annotation(DELETE_MACHINE_ANNOTATION).as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_scale_down_cordon_failure_changes_nothing() {
        let cluster = Arc::new(MockCluster::with_replicas(Some(3)).failing_at(FailAt::Cordon));
        let actuator = actuator_for(cluster.clone());

        let err = actuator
            .scale_down(&machine_set(), "node-1", &machine())
            .await
            .unwrap_err();

        assert_eq!(err.phase, RemovalPhase::Active);
        assert_eq!(cluster.replicas(), Some(3));
        assert!(cluster.annotation(DELETE_MACHINE_ANNOTATION).is_none());
    }

    #[tokio::test]
    async fn test_scale_down_annotate_failure_leaves_cordon_in_place() {
        let cluster = Arc::new(MockCluster::with_replicas(Some(3)).failing_at(FailAt::Annotate));
        let actuator = actuator_for(cluster.clone());

        let err = actuator
            .scale_down(&machine_set(), "node-1", &machine())
            .await
            .unwrap_err();

        assert_eq!(err.phase, RemovalPhase::Cordoned);
        // Replica count untouched; the cordon stays, uncompensated
        assert_eq!(cluster.replicas(), Some(3));
        assert!(cluster.is_cordoned("node-1"));
    }

    #[tokio::test]
    async fn test_scale_down_replica_update_failure_reports_marked_phase() {
        let cluster =
            Arc::new(MockCluster::with_replicas(Some(3)).failing_at(FailAt::UpdateReplicas));
        let actuator = actuator_for(cluster.clone());

        let err = actuator
            .scale_down(&machine_set(), "node-1", &machine())
            .await
            .unwrap_err();

        assert_eq!(err.phase, RemovalPhase::DeletionMarked);
        assert!(matches!(err.source, ClusterError::Conflict { .. }));
        assert_eq!(cluster.replicas(), Some(3));
    }

    #[tokio::test]
    async fn test_scale_down_at_zero_replicas_is_a_logged_noop() {
        let cluster = Arc::new(MockCluster::with_replicas(Some(0)));
        let actuator = actuator_for(cluster.clone());

        let phase = actuator
            .scale_down(&machine_set(), "node-1", &machine())
            .await
            .unwrap();

        // Annotation applied, replica count untouched
        assert_eq!(phase, RemovalPhase::DeletionMarked);
        assert_eq!(cluster.replicas(), Some(0));
        assert_eq!(
            cluster.annotation(DELETE_MACHINE_ANNOTATION).as_deref(),
            Some("true")
        );
    }
}
