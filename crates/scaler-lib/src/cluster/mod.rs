//! Cluster control-plane access
//!
//! The [`ClusterApi`] trait is the seam between the control loop and the
//! cluster: listing nodes, reading live metrics, counting pods, cordoning,
//! and the machine-set / machine mutations the actuator performs. The
//! kube-backed implementation lives in [`kube_cluster`]; tests substitute
//! in-memory mocks.

mod kube_cluster;
mod quantity;
pub mod resources;

pub use kube_cluster::KubeCluster;
pub use quantity::{parse_bytes, parse_millicores, QuantityError};

use crate::error::ClusterError;
use crate::models::{MachineRef, MachineSetRef};

pub use async_trait::async_trait;

/// Annotation consumed by the external machine-lifecycle controller to
/// eventually remove a machine. The scaler only ever sets it; it never
/// deletes the machine resource itself.
pub const DELETE_MACHINE_ANNOTATION: &str = "machine.openshift.io/cluster-api-delete-machine";

/// Absolute resource totals for one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceTotals {
    pub cpu_millis: i64,
    pub memory_bytes: i64,
    pub ephemeral_storage_bytes: i64,
}

/// A cluster node's identity and allocatable capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub name: String,
    pub allocatable: ResourceTotals,
}

/// Operations the control loop needs from the cluster control plane
///
/// All reads hand back transient copies owned by the caller; nothing is
/// cached across operations.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List all cluster nodes with their allocatable capacity
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError>;

    /// Fetch live usage metrics for a single node
    async fn node_usage(&self, node: &str) -> Result<ResourceTotals, ClusterError>;

    /// Count pods scheduled on a node within one namespace
    async fn pods_on_node(&self, node: &str, namespace: &str) -> Result<usize, ClusterError>;

    /// Mark a node unschedulable. The scaler never uncordons.
    async fn cordon_node(&self, node: &str) -> Result<(), ClusterError>;

    /// Read a machine set's desired replica count (None when the field is
    /// unset on the resource)
    async fn get_machine_set(&self, machine_set: &MachineSetRef)
        -> Result<Option<i32>, ClusterError>;

    /// Write a machine set's desired replica count
    async fn update_machine_set_replicas(
        &self,
        machine_set: &MachineSetRef,
        replicas: i32,
    ) -> Result<(), ClusterError>;

    /// Add or overwrite one annotation on a machine
    async fn annotate_machine(
        &self,
        machine: &MachineRef,
        key: &str,
        value: &str,
    ) -> Result<(), ClusterError>;
}
