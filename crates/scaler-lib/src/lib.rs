//! Core library for the fleet capacity scaler
//!
//! This crate provides the control loop that sizes a machine-set-backed
//! compute fleet:
//! - Periodic node-utilization and job-backlog sources
//! - A merge loop combining the latest snapshot of each signal
//! - A pluggable decision policy
//! - The two-phase scale actuator (replica increment; cordon, drain wait,
//!   deletion-intent marking, replica decrement)
//! - Health checks and Prometheus metrics

pub mod actuator;
pub mod backlog;
pub mod cluster;
pub mod error;
pub mod health;
pub mod merge;
pub mod models;
pub mod observability;
pub mod policy;
pub mod poller;
pub mod utilization;

pub use actuator::{RemovalPhase, ScaleActuator, DEFAULT_DRAIN_WAIT};
pub use backlog::{BacklogSource, RetryPolicy, RetryingFetcher};
pub use cluster::{ClusterApi, KubeCluster, NodeInfo, ResourceTotals, DELETE_MACHINE_ANNOTATION};
pub use error::{BacklogError, ClusterError, ConfigError, FetchError, ScaleDownError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use merge::MergeLoop;
pub use models::*;
pub use observability::ScalerMetrics;
pub use policy::{DecisionPolicy, ObserveOnlyPolicy};
pub use poller::{Poller, PollerConfig, Source};
pub use utilization::{NodeUtilizationSource, DEFAULT_WORKLOAD_NAMESPACES};
