//! The `GenerationService` trait and its error type
//!
//! The graph engine drives every remote job through this trait. HTTP is the
//! production transport; tests and embedders provide their own impls.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{JobHandle, JobStatusResponse, SubmitRequest};

/// Result type alias using ServiceError
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors from the generation service boundary
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport-level failure (connection refused, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Service API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The service answered with a body we could not decode
    #[error("Failed to decode service response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service does not implement the cancel endpoint
    #[error("Service does not support cancellation")]
    CancelUnsupported,
}

impl ServiceError {
    /// Create an API error from a status code and response body
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }
}

/// An opaque remote generation backend.
///
/// Submission returns a job handle; the engine polls `status` until the job
/// reaches a terminal state. `cancel` is best-effort and optional — backends
/// without a cancel endpoint keep the default implementation.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submit a generation job, returning its handle
    async fn submit(&self, request: SubmitRequest) -> Result<JobHandle>;

    /// Poll the current status of a job
    async fn status(&self, job_id: &str) -> Result<JobStatusResponse>;

    /// Request cancellation of a job (best-effort)
    async fn cancel(&self, job_id: &str) -> Result<()> {
        let _ = job_id;
        Err(ServiceError::CancelUnsupported)
    }

    /// Whether this service implements `cancel`
    fn supports_cancel(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RemoteStatus;

    struct NoCancelService;

    #[async_trait]
    impl GenerationService for NoCancelService {
        async fn submit(&self, _request: SubmitRequest) -> Result<JobHandle> {
            Ok(JobHandle {
                job_id: "job-1".to_string(),
            })
        }

        async fn status(&self, _job_id: &str) -> Result<JobStatusResponse> {
            Ok(JobStatusResponse {
                status: RemoteStatus::Completed,
                progress: 100,
                result: None,
                error: None,
            })
        }
    }

    #[tokio::test]
    async fn test_cancel_defaults_to_unsupported() {
        let service = NoCancelService;
        assert!(!service.supports_cancel());
        assert!(matches!(
            service.cancel("job-1").await,
            Err(ServiceError::CancelUnsupported)
        ));
    }
}
