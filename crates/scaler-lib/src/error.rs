//! Error taxonomy for the capacity scaler
//!
//! Distinguishes transient-retryable fetch failures, terminal request
//! failures, stale resource references, write conflicts, and configuration
//! errors so callers can act on each class explicitly.

use reqwest::StatusCode;
use thiserror::Error;

use crate::actuator::RemovalPhase;

/// Failures of the retrying HTTP fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-success status other than gateway timeout; never retried
    #[error("request failed with status {status}")]
    Terminal { status: StatusCode },

    /// Gateway-timeout retry ceiling hit
    #[error("max retries exceeded after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Client build or transport failure
    #[error("http request error: {0}")]
    Request(#[from] reqwest::Error),
}

/// Failures of the job-backlog source
#[derive(Debug, Error)]
pub enum BacklogError {
    #[error("invalid pending-jobs query URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("building job-platform client: {0}")]
    Client(#[source] FetchError),

    #[error("fetching pending jobs for group {group}: {source}")]
    Fetch {
        group: String,
        #[source]
        source: FetchError,
    },

    #[error("decoding pending-jobs payload for group {group}: {source}")]
    Decode {
        group: String,
        #[source]
        source: serde_json::Error,
    },

    /// The payload decoded but carried no numeric `count`; this is a hard
    /// error for the group, never a silent zero
    #[error("pending-jobs payload for group {group} has no numeric `count` field")]
    MissingCount { group: String },
}

/// Failures of cluster control-plane operations
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Referenced resource vanished between decision and actuation
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    /// Concurrent modification detected at write time; reported, not retried
    #[error("conflicting write to {kind} {name}")]
    Conflict { kind: &'static str, name: String },

    #[error("machine set {name} has no replica count defined")]
    ReplicasUnset { name: String },

    #[error("cluster API error: {0}")]
    Api(#[from] kube::Error),
}

/// A scale-down that aborted part-way through the state machine
///
/// Carries the phase the removal had reached when the failing step ran, so
/// partially applied side effects (an uncompensated cordon, a marked
/// machine) are inspectable by the caller.
#[derive(Debug, Error)]
#[error("scale-down aborted at phase {phase:?}: {source}")]
pub struct ScaleDownError {
    pub phase: RemovalPhase,
    #[source]
    pub source: ClusterError,
}

/// Malformed environment configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("name list {raw:?} contains no usable entries")]
    EmptyNameList { raw: String },

    #[error("invalid endpoint URL {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}
