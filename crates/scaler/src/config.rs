//! Scaler configuration
//!
//! Everything comes from the environment with the `SCALER_` prefix:
//! `SCALER_CLUSTER_API_SERVER`, `SCALER_CLUSTER_TOKEN`,
//! `SCALER_BACKLOG_URL`, `SCALER_BACKLOG_TOKEN`, `SCALER_INSTANCE_GROUPS`
//! plus the optional tunables below.

use anyhow::{Context, Result};
use serde::Deserialize;

use scaler_lib::{parse_name_list, ConfigError};

/// Scaler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScalerConfig {
    /// Cluster control-plane endpoint
    pub cluster_api_server: String,

    /// Bearer token for the cluster control plane
    pub cluster_token: String,

    /// Job-platform base URL
    pub backlog_url: String,

    /// Bearer token for the job platform
    pub backlog_token: String,

    /// Comma-separated instance-group names, queried in this order
    pub instance_groups: String,

    /// Comma-separated workload namespaces counted per node
    #[serde(default = "default_workload_namespaces")]
    pub workload_namespaces: String,

    /// Fetch interval for both pollers, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Wait between cordoning a node and marking its machine, in seconds
    #[serde(default = "default_drain_wait")]
    pub drain_wait_secs: u64,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,
}

fn default_workload_namespaces() -> String {
    scaler_lib::DEFAULT_WORKLOAD_NAMESPACES.join(",")
}

fn default_poll_interval() -> u64 {
    10
}

fn default_drain_wait() -> u64 {
    60
}

fn default_api_port() -> u16 {
    8080
}

impl ScalerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SCALER"))
            .build()?;

        config
            .try_deserialize()
            .context("Incomplete scaler configuration; check SCALER_* environment variables")
    }

    /// Instance groups in configuration order
    pub fn instance_groups(&self) -> Result<Vec<String>, ConfigError> {
        parse_name_list(&self.instance_groups)
    }

    /// Workload namespaces whose pod counts feed the decision input
    pub fn workload_namespaces(&self) -> Result<Vec<String>, ConfigError> {
        parse_name_list(&self.workload_namespaces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ScalerConfig {
        ScalerConfig {
            cluster_api_server: "https://api.cluster.example:6443".to_string(),
            cluster_token: "cluster-token".to_string(),
            backlog_url: "https://aap.example.com".to_string(),
            backlog_token: "aap-token".to_string(),
            instance_groups: "grp-a, grp-b".to_string(),
            workload_namespaces: default_workload_namespaces(),
            poll_interval_secs: default_poll_interval(),
            drain_wait_secs: default_drain_wait(),
            api_port: default_api_port(),
        }
    }

    #[test]
    fn test_instance_groups_split_in_order() {
        let config = sample();
        assert_eq!(config.instance_groups().unwrap(), vec!["grp-a", "grp-b"]);
    }

    #[test]
    fn test_empty_instance_groups_rejected() {
        let mut config = sample();
        config.instance_groups = "  ,  ".to_string();
        assert!(config.instance_groups().is_err());
    }

    #[test]
    fn test_default_workload_namespaces() {
        let config = sample();
        assert_eq!(
            config.workload_namespaces().unwrap(),
            vec!["aap-jobs", "uat-jobs"]
        );
    }
}
