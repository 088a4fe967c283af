//! Event types for streaming graph and run progress
//!
//! Events are sent from the engine to the canvas UI (or any consumer)
//! to report graph changes, job transitions, and run lifecycle.

use serde::{Deserialize, Serialize};

use crate::job::JobStatus;
use crate::types::{NodeId, NodeStatus};

/// Trait for sending engine events
///
/// This abstracts over the transport mechanism (IPC channel, mpsc, etc.)
/// allowing the engine to be used in different hosts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be sent (e.g., channel closed)
    fn send(&self, event: EngineEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted by the graph model, job trackers, and run coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A node or edge was added or removed
    #[serde(rename_all = "camelCase")]
    TopologyChanged { graph_id: String, version: u64 },

    /// A node's parameters changed
    #[serde(rename_all = "camelCase")]
    ParametersChanged {
        graph_id: String,
        node_id: NodeId,
        version: u64,
    },

    /// A node's execution status changed on the graph
    #[serde(rename_all = "camelCase")]
    NodeStatusChanged {
        node_id: NodeId,
        from: NodeStatus,
        to: NodeStatus,
    },

    /// A job tracker transitioned between states
    #[serde(rename_all = "camelCase")]
    JobStatusChanged {
        node_id: NodeId,
        from: JobStatus,
        to: JobStatus,
        progress: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A running job reported progress
    #[serde(rename_all = "camelCase")]
    JobProgress { node_id: NodeId, progress: u8 },

    /// A run started
    #[serde(rename_all = "camelCase")]
    RunStarted { run_id: String, graph_id: String },

    /// A wave of concurrent jobs started
    #[serde(rename_all = "camelCase")]
    WaveStarted {
        run_id: String,
        wave: usize,
        nodes: Vec<NodeId>,
    },

    /// A node was blocked because an upstream dependency failed
    #[serde(rename_all = "camelCase")]
    NodeBlocked {
        node_id: NodeId,
        failed_dependency: NodeId,
    },

    /// A run finished (possibly with per-node errors)
    #[serde(rename_all = "camelCase")]
    RunCompleted { run_id: String },

    /// A run aborted before finishing its plan
    #[serde(rename_all = "camelCase")]
    RunFailed { run_id: String, error: String },
}

impl EngineEvent {
    /// Create a job progress event
    pub fn job_progress(node_id: &str, progress: u8) -> Self {
        Self::JobProgress {
            node_id: node_id.to_string(),
            progress,
        }
    }
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when events aren't needed.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: EngineEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<EngineEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: EngineEvent) -> Result<(), EventError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(EngineEvent::job_progress("node1", 50)).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            EngineEvent::JobProgress { node_id, progress } => {
                assert_eq!(node_id, "node1");
                assert_eq!(*progress, 50);
            }
            _ => panic!("Expected JobProgress event"),
        }
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(EngineEvent::job_progress("node1", 100)).unwrap();
    }

    #[test]
    fn test_event_serde_tagging() {
        let event = EngineEvent::TopologyChanged {
            graph_id: "g1".to_string(),
            version: 3,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"topologyChanged\""));
        assert!(json.contains("graphId"));
    }
}
