//! Run coordination
//!
//! [`ExecutionCoordinator`] drives a full run: it walks a plan's parallel
//! groups in order, executes one [`JobTracker`] per node concurrently
//! within each wave, and applies the configured failure policy. A wave
//! only starts after the previous one finished, because later nodes read
//! their upstream results from the graph's cached outputs.
//!
//! The graph version is re-checked before each wave; a mismatch with the
//! plan's version aborts the run rather than executing stale structure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use generation::{GenerationService, SubmitRequest};

use crate::error::{codes, EngineError, Result};
use crate::events::{EngineEvent, EventSink, NullEventSink};
use crate::job::{CancelToken, JobConfig, JobStatus, JobTracker};
use crate::model::{GraphModel, SharedGraph};
use crate::planner::ExecutionPlan;
use crate::types::{GraphNode, NodeId, NodeStatus};

/// What happens to the rest of the run when a node fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Block the failed node's dependents; independent branches continue
    SkipDependents,
    /// Cancel the active wave and submit nothing further
    AbortOnFirstError,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::SkipDependents
    }
}

/// Configuration for a run
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Failure policy
    pub policy: FailurePolicy,
    /// Per-node job configuration
    pub job: JobConfig,
}

impl RunConfig {
    /// Set the failure policy
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the per-node job configuration
    pub fn with_job_config(mut self, job: JobConfig) -> Self {
        self.job = job;
        self
    }
}

/// One node's failure within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    pub node_id: NodeId,
    pub code: String,
    pub message: String,
}

/// Aggregate result of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: String,
    /// Terminal status of every node the run touched
    pub statuses: HashMap<NodeId, NodeStatus>,
    /// Errors encountered, in wave order
    pub errors: Vec<RunError>,
    /// Total wall-clock time
    pub elapsed_ms: u64,
    /// Whether the run was cancelled before finishing its plan
    pub cancelled: bool,
}

impl RunResult {
    /// Whether every touched node completed successfully
    pub fn all_completed(&self) -> bool {
        !self.cancelled
            && self
                .statuses
                .values()
                .all(|s| *s == NodeStatus::Completed)
    }
}

/// Drives execution plans against the generation service
pub struct ExecutionCoordinator {
    service: Arc<dyn GenerationService>,
    events: Arc<dyn EventSink>,
    config: RunConfig,
}

impl ExecutionCoordinator {
    /// Create a coordinator over a generation service
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            service,
            events: Arc::new(NullEventSink),
            config: RunConfig::default(),
        }
    }

    /// Attach an event sink for run progress
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Set the run configuration
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute a plan with a fresh cancellation token
    pub async fn run(&self, graph: &SharedGraph, plan: &ExecutionPlan) -> Result<RunResult> {
        self.run_with_token(graph, plan, CancelToken::new()).await
    }

    /// Execute a plan; cancelling the token stops the active wave and
    /// prevents submission of later waves
    pub async fn run_with_token(
        &self,
        graph: &SharedGraph,
        plan: &ExecutionPlan,
        token: CancelToken,
    ) -> Result<RunResult> {
        if plan.has_cycles {
            return Err(EngineError::CyclicPlan);
        }

        let run_id = format!("run-{}", uuid::Uuid::new_v4());
        let started = Instant::now();
        let graph_id = { graph.read().await.id().to_string() };

        log::info!(
            "ExecutionCoordinator: starting {} with {} waves",
            run_id,
            plan.parallel_groups.len()
        );
        let _ = self.events.send(EngineEvent::RunStarted {
            run_id: run_id.clone(),
            graph_id,
        });

        let mut statuses: HashMap<NodeId, NodeStatus> = HashMap::new();
        let mut errors: Vec<RunError> = Vec::new();
        let mut blocked: HashSet<NodeId> = HashSet::new();
        let mut cancelled = false;

        'waves: for (wave_index, group) in plan.parallel_groups.iter().enumerate() {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }

            // Snapshot requests under one read lock, checking staleness first
            let mut wave: Vec<(NodeId, SubmitRequest)> = Vec::new();
            {
                let g = graph.read().await;
                if g.version() != plan.graph_version {
                    let err = EngineError::StaleGraph {
                        planned: plan.graph_version,
                        actual: g.version(),
                    };
                    log::warn!("ExecutionCoordinator: {} aborted: {}", run_id, err);
                    let _ = self.events.send(EngineEvent::RunFailed {
                        run_id: run_id.clone(),
                        error: err.to_string(),
                    });
                    return Err(err);
                }
                for node_id in group {
                    if blocked.contains(node_id) {
                        continue;
                    }
                    let node = g
                        .node(node_id)
                        .ok_or_else(|| EngineError::UnknownNode(node_id.clone()))?;
                    wave.push((node_id.clone(), build_request(&g, node)));
                }
            }

            if wave.is_empty() {
                continue;
            }

            let _ = self.events.send(EngineEvent::WaveStarted {
                run_id: run_id.clone(),
                wave: wave_index,
                nodes: wave.iter().map(|(id, _)| id.clone()).collect(),
            });

            {
                let mut g = graph.write().await;
                for (node_id, _) in &wave {
                    g.set_status(node_id, NodeStatus::Queued)?;
                }
            }

            let trackers = wave.into_iter().map(|(node_id, request)| {
                let tracker = JobTracker::new(
                    node_id.clone(),
                    self.service.clone(),
                    self.config.job.clone(),
                    self.events.clone(),
                    token.clone(),
                );
                async move { (node_id, tracker.execute(request).await) }
            });
            let outcomes = join_all(trackers).await;

            // Write results back and collect this wave's failures
            let mut failed: Vec<NodeId> = Vec::new();
            {
                let mut g = graph.write().await;
                for (node_id, outcome) in outcomes {
                    let status = match outcome.job.status {
                        JobStatus::Completed => NodeStatus::Completed,
                        JobStatus::Error => NodeStatus::Error,
                        JobStatus::Cancelled => NodeStatus::Cancelled,
                        // Trackers only return in terminal states; anything
                        // else means the job never got off the ground
                        _ => NodeStatus::Error,
                    };
                    g.set_status(&node_id, status)?;
                    if let Some(output) = outcome.output {
                        g.set_output(&node_id, output)?;
                    }
                    if let Some(message) = &outcome.job.error {
                        g.set_error(&node_id, message.clone())?;
                        errors.push(RunError {
                            node_id: node_id.clone(),
                            code: outcome
                                .error_code
                                .clone()
                                .unwrap_or_else(|| codes::JOB_FAILED.to_string()),
                            message: message.clone(),
                        });
                    }
                    if status == NodeStatus::Error {
                        failed.push(node_id.clone());
                    }
                    if status == NodeStatus::Cancelled {
                        cancelled = true;
                    }
                    statuses.insert(node_id, status);
                }
            }

            if !failed.is_empty() {
                match self.config.policy {
                    FailurePolicy::SkipDependents => {
                        self.block_dependents(graph, &failed, &mut blocked, &mut statuses)
                            .await?;
                    }
                    FailurePolicy::AbortOnFirstError => {
                        log::info!(
                            "ExecutionCoordinator: {} aborting after wave {} failure",
                            run_id,
                            wave_index
                        );
                        token.cancel();
                        break 'waves;
                    }
                }
            }

            if cancelled {
                break;
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "ExecutionCoordinator: {} finished in {}ms ({} errors{})",
            run_id,
            elapsed_ms,
            errors.len(),
            if cancelled { ", cancelled" } else { "" }
        );
        let _ = self.events.send(EngineEvent::RunCompleted {
            run_id: run_id.clone(),
        });

        Ok(RunResult {
            run_id,
            statuses,
            errors,
            elapsed_ms,
            cancelled,
        })
    }

    /// Mark every direct and transitive dependent of the failed nodes as
    /// blocked, on the graph and in the run's status map
    async fn block_dependents(
        &self,
        graph: &SharedGraph,
        failed: &[NodeId],
        blocked: &mut HashSet<NodeId>,
        statuses: &mut HashMap<NodeId, NodeStatus>,
    ) -> Result<()> {
        let mut newly_blocked: Vec<(NodeId, NodeId)> = Vec::new();
        {
            let g = graph.read().await;
            for failed_id in failed {
                for dependent in g.transitive_dependents(failed_id) {
                    if blocked.insert(dependent.clone()) {
                        newly_blocked.push((dependent, failed_id.clone()));
                    }
                }
            }
        }

        let mut g = graph.write().await;
        for (node_id, failed_dependency) in newly_blocked {
            g.set_status(&node_id, NodeStatus::Blocked)?;
            statuses.insert(node_id.clone(), NodeStatus::Blocked);
            let _ = self.events.send(EngineEvent::NodeBlocked {
                node_id,
                failed_dependency,
            });
        }
        Ok(())
    }
}

/// Build a node's submit request: its parameters plus every upstream
/// cached output, keyed by the input port the edge arrives at. Multiple
/// edges into one (multiple) port accumulate into an array.
fn build_request(graph: &GraphModel, node: &GraphNode) -> SubmitRequest {
    let mut parameters = node.parameters.clone();
    let mut port_fed: HashSet<String> = HashSet::new();

    for edge in graph.incoming_edges(&node.id) {
        let upstream = match graph.node(&edge.source) {
            Some(n) => n,
            None => continue,
        };
        let output = match &upstream.cached_output {
            Some(o) => o,
            None => continue,
        };
        let value = serde_json::to_value(output).unwrap_or(serde_json::Value::Null);

        if port_fed.insert(edge.target_port.clone()) {
            // A port value overrides any literal parameter of the same name
            parameters.insert(edge.target_port.clone(), value);
        } else if let Some(existing) = parameters.get_mut(&edge.target_port) {
            match existing {
                serde_json::Value::Array(items) => items.push(value),
                other => {
                    let first = other.take();
                    *other = serde_json::Value::Array(vec![first, value]);
                }
            }
        }
    }

    SubmitRequest {
        node_type: node.node_type.clone(),
        category: node.category.as_str().to_string(),
        parameters,
    }
}
