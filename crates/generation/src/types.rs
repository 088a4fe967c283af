//! Wire types for the remote generation API
//!
//! These mirror the JSON shapes exchanged with the generation service:
//! job submission, status polling, and the outputs a finished job returns.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A request to start a generation job for one node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Node type identifier (e.g., "image-generation")
    pub node_type: String,
    /// Node category (e.g., "processing")
    pub category: String,
    /// Resolved parameters, including upstream outputs keyed by input port
    pub parameters: HashMap<String, serde_json::Value>,
}

/// Handle returned by a successful job submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    /// Service-assigned job identifier
    pub job_id: String,
}

/// Status of a job as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteStatus {
    /// Accepted but not yet scheduled
    Pending,
    /// Waiting for a worker
    Queued,
    /// A worker is generating
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl RemoteStatus {
    /// Whether this status is terminal (no further polling needed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemoteStatus::Completed | RemoteStatus::Failed | RemoteStatus::Cancelled
        )
    }
}

/// Structured error reported by the service for a failed job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteError {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// One poll of a job's status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    /// Current job status
    pub status: RemoteStatus,
    /// Progress in percent (0..=100)
    #[serde(default)]
    pub progress: u8,
    /// Output, present once `status` is `Completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<NodeOutput>,
    /// Error details, present once `status` is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

/// The output a completed generation job produces for a node
///
/// Exactly which fields are populated depends on `kind`: image/video jobs
/// return URLs, text jobs return `text`, structured jobs return `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOutput {
    /// Output kind (e.g., "image", "video", "text")
    pub kind: String,
    /// Primary asset URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Additional asset URLs (multi-result jobs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    /// Text payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Service-specific metadata (seed, timings, model id, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NodeOutput {
    /// Create an asset output pointing at a URL
    pub fn asset(kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            url: Some(url.into()),
            urls: None,
            text: None,
            data: None,
            metadata: None,
        }
    }

    /// Create a text output
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            url: None,
            urls: None,
            text: Some(text.into()),
            data: None,
            metadata: None,
        }
    }

    /// Attach metadata to this output
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
