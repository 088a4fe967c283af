//! Error types for the graph engine

use thiserror::Error;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Stable error codes reported alongside per-node run failures
pub mod codes {
    pub const SUBMISSION_FAILED: &str = "submission_failed";
    pub const POLL_FAILED: &str = "poll_failed";
    pub const JOB_FAILED: &str = "job_failed";
    pub const TIMEOUT: &str = "timeout";
    pub const CANCELLED: &str = "cancelled";
}

/// Errors that can occur in the graph engine
///
/// Connection and graph validation do NOT use this type — they return
/// structured verdicts/results the caller inspects. These errors cover
/// model misuse and asynchronous execution failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced node does not exist in the graph
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A referenced port does not exist on its node
    #[error("Unknown port '{port}' on node '{node}'")]
    UnknownPort { node: String, port: String },

    /// A node with this id already exists
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    /// An edge with this id already exists
    #[error("Duplicate edge id: {0}")]
    DuplicateEdge(String),

    /// A node type is not registered
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// `submit` was called while the tracker was not idle
    #[error("Submit called for node '{0}' while its job is not idle")]
    SubmitMisuse(String),

    /// The generation service rejected or failed a request
    #[error("Generation service error: {0}")]
    Service(#[from] generation::ServiceError),

    /// Status polling kept failing past the retry budget
    #[error("Status polling failed after {attempts} attempts: {last_error}")]
    PollExhausted { attempts: u32, last_error: String },

    /// The service reported the job as failed
    #[error("Job failed ({code}): {message}")]
    JobFailed { code: String, message: String },

    /// The node exceeded its maximum wall-clock duration
    #[error("Node '{node}' exceeded the {limit_secs}s execution limit")]
    Timeout { node: String, limit_secs: u64 },

    /// The graph was mutated while a run was in flight
    #[error("Graph changed during execution (planned against version {planned}, now {actual})")]
    StaleGraph { planned: u64, actual: u64 },

    /// A plan with cycles was handed to the coordinator
    #[error("Cannot execute a plan with cycles")]
    CyclicPlan,

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Create an unknown-port error
    pub fn unknown_port(node: impl Into<String>, port: impl Into<String>) -> Self {
        Self::UnknownPort {
            node: node.into(),
            port: port.into(),
        }
    }
}
