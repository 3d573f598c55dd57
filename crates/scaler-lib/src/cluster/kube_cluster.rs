//! kube-backed implementation of [`ClusterApi`]
//!
//! Connects to the control plane with an endpoint + bearer token (the
//! fleet's control planes sit behind self-signed certificates, so
//! certificate verification is disabled on this client).

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::config::AuthInfo;
use kube::{Client, Config};
use secrecy::SecretString;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::resources::{Machine, MachineSet, NodeMetrics};
use super::{async_trait, ClusterApi, NodeInfo, ResourceTotals};
use crate::cluster::quantity::{parse_bytes, parse_millicores};
use crate::error::ClusterError;
use crate::models::{MachineRef, MachineSetRef};

/// Cluster access over a kube client
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connect with an API server endpoint and bearer token
    pub async fn connect(api_server: &str, token: &str) -> Result<Self> {
        let cluster_url = api_server
            .parse::<http::Uri>()
            .with_context(|| format!("Invalid cluster API endpoint: {}", api_server))?;

        let mut config = Config::new(cluster_url);
        config.auth_info = AuthInfo {
            token: Some(SecretString::new(token.to_string())),
            ..AuthInfo::default()
        };
        config.accept_invalid_certs = true;

        let client = Client::try_from(config).context("Failed to create cluster client")?;
        Ok(Self { client })
    }

    /// Wrap an already-built client (used when kubeconfig-based auth is
    /// handled by the caller)
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    fn node_metrics(&self) -> Api<NodeMetrics> {
        Api::all(self.client.clone())
    }

    fn machine_sets(&self, namespace: &str) -> Api<MachineSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn machines(&self, namespace: &str) -> Api<Machine> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_nodes(&self) -> Result<Vec<NodeInfo>, ClusterError> {
        let list = self.nodes().list(&ListParams::default()).await?;

        let mut nodes = Vec::with_capacity(list.items.len());
        for node in list.items {
            let Some(name) = node.metadata.name else {
                continue;
            };
            let allocatable = node
                .status
                .as_ref()
                .and_then(|s| s.allocatable.as_ref())
                .map(|alloc| totals_from_resource_list(&name, alloc))
                .unwrap_or_default();

            nodes.push(NodeInfo { name, allocatable });
        }
        Ok(nodes)
    }

    async fn node_usage(&self, node: &str) -> Result<ResourceTotals, ClusterError> {
        let metrics = self
            .node_metrics()
            .get(node)
            .await
            .map_err(|e| map_kube_err("NodeMetrics", node, e))?;

        Ok(ResourceTotals {
            cpu_millis: quantity_or_zero(node, "cpu", parse_millicores(&metrics.usage.cpu)),
            memory_bytes: quantity_or_zero(node, "memory", parse_bytes(&metrics.usage.memory)),
            ephemeral_storage_bytes: metrics
                .usage
                .ephemeral_storage
                .as_ref()
                .map(|q| quantity_or_zero(node, "ephemeral-storage", parse_bytes(q)))
                .unwrap_or(0),
        })
    }

    async fn pods_on_node(&self, node: &str, namespace: &str) -> Result<usize, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().fields(&format!("spec.nodeName={}", node));
        let list = pods.list(&params).await?;
        Ok(list.items.len())
    }

    async fn cordon_node(&self, node: &str) -> Result<(), ClusterError> {
        let patch = serde_json::json!({ "spec": { "unschedulable": true } });
        self.nodes()
            .patch(node, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_err("Node", node, e))?;
        Ok(())
    }

    async fn get_machine_set(
        &self,
        machine_set: &MachineSetRef,
    ) -> Result<Option<i32>, ClusterError> {
        let set = self
            .machine_sets(&machine_set.namespace)
            .get(&machine_set.name)
            .await
            .map_err(|e| map_kube_err("MachineSet", &machine_set.name, e))?;
        Ok(set.spec.replicas)
    }

    async fn update_machine_set_replicas(
        &self,
        machine_set: &MachineSetRef,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        let patch = serde_json::json!({ "spec": { "replicas": replicas } });
        self.machine_sets(&machine_set.namespace)
            .patch(
                &machine_set.name,
                &PatchParams::default(),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| map_kube_err("MachineSet", &machine_set.name, e))?;
        Ok(())
    }

    async fn annotate_machine(
        &self,
        machine: &MachineRef,
        key: &str,
        value: &str,
    ) -> Result<(), ClusterError> {
        let api = self.machines(&machine.namespace);

        let existing = api
            .get(&machine.name)
            .await
            .map_err(|e| map_kube_err("Machine", &machine.name, e))?;
        debug!(
            machine = %machine.name,
            annotations = ?existing.metadata.annotations.as_ref().map(|a| a.keys().collect::<Vec<_>>()),
            "Annotating machine"
        );

        let patch = serde_json::json!({
            "metadata": { "annotations": { key: value } }
        });
        api.patch(
            &machine.name,
            &PatchParams::default(),
            &Patch::Merge(&patch),
        )
        .await
        .map_err(|e| map_kube_err("Machine", &machine.name, e))?;
        Ok(())
    }
}

/// Map kube API errors onto the scaler's taxonomy
fn map_kube_err(kind: &'static str, name: &str, err: kube::Error) -> ClusterError {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => ClusterError::NotFound {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(resp) if resp.code == 409 => ClusterError::Conflict {
            kind,
            name: name.to_string(),
        },
        _ => ClusterError::Api(err),
    }
}

fn totals_from_resource_list(node: &str, list: &BTreeMap<String, Quantity>) -> ResourceTotals {
    ResourceTotals {
        cpu_millis: list
            .get("cpu")
            .map(|q| quantity_or_zero(node, "cpu", parse_millicores(q)))
            .unwrap_or(0),
        memory_bytes: list
            .get("memory")
            .map(|q| quantity_or_zero(node, "memory", parse_bytes(q)))
            .unwrap_or(0),
        ephemeral_storage_bytes: list
            .get("ephemeral-storage")
            .map(|q| quantity_or_zero(node, "ephemeral-storage", parse_bytes(q)))
            .unwrap_or(0),
    }
}

/// A quantity that fails to parse is logged and treated as zero; the
/// percentage guard downstream turns a zero allocatable into None rather
/// than a bogus number.
fn quantity_or_zero(
    node: &str,
    resource: &str,
    parsed: Result<i64, super::quantity::QuantityError>,
) -> i64 {
    match parsed {
        Ok(v) => v,
        Err(e) => {
            warn!(node, resource, error = %e, "Unparsable quantity; treating as zero");
            0
        }
    }
}
