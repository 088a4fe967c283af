//! Easel graph engine — the node-graph model and execution core
//!
//! Users assemble a directed graph of typed generation nodes on a canvas;
//! this crate owns everything between the canvas and the remote generation
//! service:
//!
//! - Typed ports and the compatibility lattice (`compat`)
//! - The graph model with versioned mutations and change events (`model`)
//! - Per-edge connection gating (`connection`)
//! - Whole-graph static validation (`validation`)
//! - Topological planning into parallel waves (`planner`)
//! - Per-node asynchronous job tracking (`job`)
//! - Wave-by-wave run coordination with failure policies (`coordinator`)
//!
//! Rendering, interaction, and persistence live in the host application;
//! the engine communicates with them through ids, events, and snapshots.

pub mod builder;
pub mod catalog;
pub mod compat;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod job;
pub mod model;
pub mod planner;
pub mod registry;
pub mod types;
pub mod validation;

// Re-export key types
pub use builder::GraphBuilder;
pub use compat::compatible;
pub use connection::{ConnectOptions, ConnectionVerdict, ProposedEdge, RejectReason};
pub use coordinator::{ExecutionCoordinator, FailurePolicy, RunConfig, RunError, RunResult};
pub use error::{EngineError, Result};
pub use events::{EngineEvent, EventError, EventSink, NullEventSink, VecEventSink};
pub use job::{CancelToken, Job, JobConfig, JobOutcome, JobStatus, JobTracker};
pub use model::{GraphModel, GraphSnapshot, SharedGraph};
pub use planner::ExecutionPlan;
pub use registry::NodeTypeRegistry;
pub use types::{
    EdgeId, GraphEdge, GraphNode, NodeCategory, NodeId, NodeMetadata, NodeStatus, ParameterSpec,
    PortId, PortSpec, PortType,
};
pub use validation::{
    GraphStats, GraphValidationResult, IssueCode, Severity, ValidationIssue,
};

// Re-export the generation-service types consumers need alongside the engine
pub use generation::{GenerationService, NodeOutput, SubmitRequest};
