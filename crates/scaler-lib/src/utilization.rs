//! Node-utilization source
//!
//! Lists cluster nodes and pairs each with its live metrics and workload
//! pod counts. A node whose metrics or pod counts cannot be fetched is
//! logged and omitted from the snapshot; the rest of the batch continues.

use std::sync::Arc;
use tracing::warn;

use crate::cluster::ClusterApi;
use crate::error::ClusterError;
use crate::models::{
    percent_of, CpuStat, MemoryStat, NamespacePodCount, NodeSnapshot, StorageStat,
};
use crate::poller::{async_trait, Source};

/// Default workload namespaces whose pod counts feed the decision input
pub const DEFAULT_WORKLOAD_NAMESPACES: [&str; 2] = ["aap-jobs", "uat-jobs"];

/// Utilization source over the cluster control plane
pub struct NodeUtilizationSource {
    cluster: Arc<dyn ClusterApi>,
    namespaces: Vec<String>,
}

impl NodeUtilizationSource {
    pub fn new(cluster: Arc<dyn ClusterApi>, namespaces: Vec<String>) -> Self {
        Self {
            cluster,
            namespaces,
        }
    }

    /// Source with the default workload namespaces
    pub fn with_default_namespaces(cluster: Arc<dyn ClusterApi>) -> Self {
        Self::new(
            cluster,
            DEFAULT_WORKLOAD_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
        )
    }

    /// Compute a utilization snapshot for every measurable node
    ///
    /// The result is unordered and contains one entry per node whose
    /// metrics and pod counts were all available this cycle.
    pub async fn fetch_utilization(&self) -> Result<Vec<NodeSnapshot>, ClusterError> {
        let nodes = self.cluster.list_nodes().await?;
        let mut snapshots = Vec::with_capacity(nodes.len());

        'nodes: for node in nodes {
            let usage = match self.cluster.node_usage(&node.name).await {
                Ok(usage) => usage,
                Err(e) => {
                    warn!(node = %node.name, error = %e, "Skipping node: metrics unavailable");
                    continue;
                }
            };

            let mut pods = Vec::with_capacity(self.namespaces.len());
            for namespace in &self.namespaces {
                match self.cluster.pods_on_node(&node.name, namespace).await {
                    Ok(count) => pods.push(NamespacePodCount {
                        namespace: namespace.clone(),
                        count,
                    }),
                    Err(e) => {
                        warn!(
                            node = %node.name,
                            namespace = %namespace,
                            error = %e,
                            "Skipping node: pod count unavailable"
                        );
                        continue 'nodes;
                    }
                }
            }

            let allocatable = node.allocatable;
            let storage_available =
                (allocatable.ephemeral_storage_bytes - usage.ephemeral_storage_bytes).max(0);

            snapshots.push(NodeSnapshot {
                name: node.name,
                cpu: CpuStat {
                    used_millis: usage.cpu_millis,
                    allocatable_millis: allocatable.cpu_millis,
                    percent: percent_of(usage.cpu_millis, allocatable.cpu_millis),
                },
                memory: MemoryStat {
                    used_bytes: usage.memory_bytes,
                    available_bytes: allocatable.memory_bytes,
                    percent: percent_of(usage.memory_bytes, allocatable.memory_bytes),
                },
                storage: StorageStat {
                    used_bytes: usage.ephemeral_storage_bytes,
                    available_bytes: storage_available,
                    percent: percent_of(
                        usage.ephemeral_storage_bytes,
                        allocatable.ephemeral_storage_bytes,
                    ),
                },
                pods,
                observed_at: chrono::Utc::now().timestamp(),
            });
        }

        Ok(snapshots)
    }
}

#[async_trait]
impl Source for NodeUtilizationSource {
    type Item = Vec<NodeSnapshot>;

    async fn fetch(&self) -> anyhow::Result<Self::Item> {
        Ok(self.fetch_utilization().await?)
    }
}
