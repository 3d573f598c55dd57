//! Merge loop
//!
//! Single consumer of both poller channels. Keeps the latest snapshot
//! from each source, replacing it outright on every receipt, and invokes
//! the decision policy once both sources have delivered at least one
//! value. Actuation runs on a spawned task so a long scale-down (with its
//! fixed drain wait) can never starve snapshot intake.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::actuator::ScaleActuator;
use crate::health::{components, HealthRegistry};
use crate::models::{JobBacklogEntry, NodeSnapshot, ScaleAction, ScaleDecisionInput};
use crate::observability::ScalerMetrics;
use crate::policy::DecisionPolicy;

/// Merge loop over the two signal sources
pub struct MergeLoop {
    policy: Arc<dyn DecisionPolicy>,
    actuator: Arc<ScaleActuator>,
    metrics: ScalerMetrics,
    health: HealthRegistry,
    latest_nodes: Option<Vec<NodeSnapshot>>,
    latest_backlog: Option<Vec<JobBacklogEntry>>,
}

impl MergeLoop {
    pub fn new(
        policy: Arc<dyn DecisionPolicy>,
        actuator: Arc<ScaleActuator>,
        metrics: ScalerMetrics,
        health: HealthRegistry,
    ) -> Self {
        Self {
            policy,
            actuator,
            metrics,
            health,
            latest_nodes: None,
            latest_backlog: None,
        }
    }

    /// Run until shutdown or until either source channel closes
    pub async fn run(
        mut self,
        mut nodes_rx: mpsc::Receiver<Vec<NodeSnapshot>>,
        mut backlog_rx: mpsc::Receiver<Vec<JobBacklogEntry>>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!("Starting merge loop");

        loop {
            tokio::select! {
                received = nodes_rx.recv() => match received {
                    Some(nodes) => {
                        self.metrics.set_nodes_observed(nodes.len());
                        self.latest_nodes = Some(nodes);
                        self.health.set_healthy(components::MERGE_LOOP).await;
                        self.decide_if_warm();
                    }
                    None => {
                        info!("Node snapshot channel closed; stopping merge loop");
                        self.health
                            .set_unhealthy(components::MERGE_LOOP, "node source channel closed")
                            .await;
                        break;
                    }
                },
                received = backlog_rx.recv() => match received {
                    Some(backlog) => {
                        let total: u64 = backlog.iter().map(|e| e.count).sum();
                        self.metrics.set_pending_jobs(total);
                        self.latest_backlog = Some(backlog);
                        self.health.set_healthy(components::MERGE_LOOP).await;
                        self.decide_if_warm();
                    }
                    None => {
                        info!("Backlog channel closed; stopping merge loop");
                        self.health
                            .set_unhealthy(components::MERGE_LOOP, "backlog source channel closed")
                            .await;
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    info!("Shutting down merge loop");
                    break;
                }
            }
        }
    }

    /// Invoke the decision path if both sources have delivered
    ///
    /// Every post-warm-up receipt re-triggers the path with the other
    /// source's latest value, stale or not; there is no debouncing.
    fn decide_if_warm(&self) {
        let (Some(nodes), Some(backlog)) = (&self.latest_nodes, &self.latest_backlog) else {
            debug!("Holding decision: a source has not delivered yet");
            return;
        };

        let input = ScaleDecisionInput {
            nodes: nodes.clone(),
            backlog: backlog.clone(),
        };

        let action = self.policy.decide(&input);
        self.metrics.record_decision(action_label(&action));

        if matches!(action, ScaleAction::Hold) {
            return;
        }

        // Off the hot path: intake must stay responsive through the
        // actuator's drain wait
        let actuator = self.actuator.clone();
        tokio::spawn(async move {
            actuator.execute(action).await;
        });
    }
}

fn action_label(action: &ScaleAction) -> &'static str {
    match action {
        ScaleAction::Hold => "hold",
        ScaleAction::ScaleUp { .. } => "scale_up",
        ScaleAction::ScaleDown { .. } => "scale_down",
    }
}
