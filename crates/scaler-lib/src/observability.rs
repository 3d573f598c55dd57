//! Prometheus metrics for the capacity scaler
//!
//! Poll cycle and actuation counters plus last-observed gauges, exposed
//! through the process-global registry and served by the binary's
//! `/metrics` endpoint.

use prometheus::{
    register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ScalerMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ScalerMetricsInner {
    poll_cycles: IntCounterVec,
    poll_failures: IntCounterVec,
    decisions: IntCounterVec,
    scale_ups: IntCounterVec,
    scale_downs: IntCounterVec,
    nodes_observed: IntGauge,
    pending_jobs: IntGauge,
}

impl ScalerMetricsInner {
    fn new() -> Self {
        Self {
            poll_cycles: register_int_counter_vec!(
                "capacity_scaler_poll_cycles_total",
                "Completed poll cycles per signal source",
                &["source"]
            )
            .expect("Failed to register poll_cycles_total"),

            poll_failures: register_int_counter_vec!(
                "capacity_scaler_poll_failures_total",
                "Poll cycles that failed and withheld publication",
                &["source"]
            )
            .expect("Failed to register poll_failures_total"),

            decisions: register_int_counter_vec!(
                "capacity_scaler_decisions_total",
                "Decision-policy invocations by resulting action",
                &["action"]
            )
            .expect("Failed to register decisions_total"),

            scale_ups: register_int_counter_vec!(
                "capacity_scaler_scale_ups_total",
                "Scale-up attempts by outcome",
                &["outcome"]
            )
            .expect("Failed to register scale_ups_total"),

            scale_downs: register_int_counter_vec!(
                "capacity_scaler_scale_downs_total",
                "Scale-down attempts by outcome",
                &["outcome"]
            )
            .expect("Failed to register scale_downs_total"),

            nodes_observed: register_int_gauge!(
                "capacity_scaler_nodes_observed",
                "Nodes in the most recent utilization snapshot"
            )
            .expect("Failed to register nodes_observed"),

            pending_jobs: register_int_gauge!(
                "capacity_scaler_pending_jobs",
                "Total pending jobs across all instance groups in the most recent backlog snapshot"
            )
            .expect("Failed to register pending_jobs"),
        }
    }
}

/// Scaler metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ScalerMetrics {
    _private: (),
}

impl Default for ScalerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ScalerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ScalerMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record a completed poll cycle for a source
    pub fn record_poll_cycle(&self, source: &str) {
        self.inner().poll_cycles.with_label_values(&[source]).inc();
    }

    /// Record a failed poll cycle for a source
    pub fn record_poll_failure(&self, source: &str) {
        self.inner().poll_failures.with_label_values(&[source]).inc();
    }

    /// Record a decision-policy invocation and its action
    pub fn record_decision(&self, action: &str) {
        self.inner().decisions.with_label_values(&[action]).inc();
    }

    /// Record a scale-up attempt outcome ("ok" or "error")
    pub fn record_scale_up(&self, outcome: &str) {
        self.inner().scale_ups.with_label_values(&[outcome]).inc();
    }

    /// Record a scale-down attempt outcome ("ok" or "error")
    pub fn record_scale_down(&self, outcome: &str) {
        self.inner().scale_downs.with_label_values(&[outcome]).inc();
    }

    /// Update the node-count gauge from the latest utilization snapshot
    pub fn set_nodes_observed(&self, count: usize) {
        self.inner().nodes_observed.set(count as i64);
    }

    /// Update the pending-jobs gauge from the latest backlog snapshot
    pub fn set_pending_jobs(&self, total: u64) {
        self.inner().pending_jobs.set(total as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle_is_cloneable() {
        let metrics = ScalerMetrics::new();
        let clone = metrics.clone();

        metrics.record_poll_cycle("node-utilization");
        clone.record_poll_failure("job-backlog");
        metrics.set_nodes_observed(3);
        clone.set_pending_jobs(42);
    }

    #[test]
    fn test_metrics_initialize_once() {
        // Second handle must reuse the global registry rather than
        // re-registering (which would panic)
        let _a = ScalerMetrics::new();
        let _b = ScalerMetrics::new();
    }
}
