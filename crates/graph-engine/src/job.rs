//! Per-node job tracking
//!
//! A [`JobTracker`] drives one node's generation job against the remote
//! service: submit, poll on an interval, retry transient poll failures with
//! bounded backoff, enforce a wall-clock limit, and honor cooperative
//! cancellation. State machine:
//!
//! ```text
//! idle -> queued -> running -> (completed | error | cancelled)
//! ```
//!
//! `submit` from any state other than `idle` is a programming error: it is
//! rejected without touching the in-flight job.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use generation::{GenerationService, NodeOutput, RemoteStatus, SubmitRequest};

use crate::error::{codes, EngineError, Result};
use crate::events::{EngineEvent, EventSink};
use crate::types::NodeId;

/// Status of a tracked job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Not yet submitted
    Idle,
    /// Submitted, waiting for a worker
    Queued,
    /// The service is generating
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Error,
    /// Cancelled before completion
    Cancelled,
}

impl JobStatus {
    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Cancelled
        )
    }
}

/// Runtime record of one node's job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// The node this job runs for
    pub node_id: NodeId,
    /// Service-assigned job id, set after submission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Current tracker state
    pub status: JobStatus,
    /// Progress in percent (0..=100)
    pub progress: u8,
    /// When the job was submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Error message for `Error` status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            job_id: None,
            status: JobStatus::Idle,
            progress: 0,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

/// Configuration for job polling and timeouts
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Interval between status polls
    pub poll_interval: Duration,
    /// Base delay for poll-failure backoff (doubles per consecutive failure)
    pub backoff_base: Duration,
    /// Consecutive poll failures tolerated before giving up
    pub max_poll_failures: u32,
    /// Maximum wall-clock duration before the job times out
    pub max_duration: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            backoff_base: Duration::from_millis(500),
            max_poll_failures: 5,
            max_duration: Duration::from_secs(600),
        }
    }
}

impl JobConfig {
    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the backoff base delay
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the poll-failure budget
    pub fn with_max_poll_failures(mut self, max: u32) -> Self {
        self.max_poll_failures = max;
        self
    }

    /// Set the maximum wall-clock duration
    pub fn with_max_duration(mut self, max: Duration) -> Self {
        self.max_duration = max;
        self
    }
}

/// Cooperative cancellation token shared between a run and its trackers
///
/// Cloning shares the underlying flag; cancelling any clone cancels all.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Signal cancellation to every clone of this token
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether cancellation has been signalled
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is signalled; pends forever otherwise
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // The sender lives inside this token, so this branch means every
        // clone was dropped; park forever rather than resolve spuriously.
        std::future::pending::<()>().await
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of driving one job to a terminal state
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// The final job record
    pub job: Job,
    /// Output for a completed job
    pub output: Option<NodeOutput>,
    /// Stable error code for a failed job (see [`crate::error::codes`])
    pub error_code: Option<String>,
}

/// Per-node state machine driving one generation job
pub struct JobTracker {
    service: Arc<dyn GenerationService>,
    config: JobConfig,
    events: Arc<dyn EventSink>,
    cancel: CancelToken,
    job: Job,
    deadline: Option<tokio::time::Instant>,
    error_code: Option<String>,
}

impl JobTracker {
    /// Create a tracker for a node
    pub fn new(
        node_id: impl Into<String>,
        service: Arc<dyn GenerationService>,
        config: JobConfig,
        events: Arc<dyn EventSink>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            service,
            config,
            events,
            cancel,
            job: Job::new(node_id),
            deadline: None,
            error_code: None,
        }
    }

    /// The current job record
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// The cancellation token this tracker observes
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Submit the job to the generation service.
    ///
    /// Only valid from `Idle`. Any other state is a misuse: the in-flight
    /// job is left untouched and an error is returned.
    pub async fn submit(&mut self, request: SubmitRequest) -> Result<()> {
        if self.job.status != JobStatus::Idle {
            log::warn!(
                "JobTracker: submit for node '{}' ignored (status {:?})",
                self.job.node_id,
                self.job.status
            );
            return Err(EngineError::SubmitMisuse(self.job.node_id.clone()));
        }

        log::debug!(
            "JobTracker: submitting '{}' job for node '{}'",
            request.node_type,
            self.job.node_id
        );

        match self.service.submit(request).await {
            Ok(handle) => {
                self.job.job_id = Some(handle.job_id);
                self.job.started_at = Some(Utc::now());
                self.deadline = Some(tokio::time::Instant::now() + self.config.max_duration);
                self.transition(JobStatus::Queued);
                Ok(())
            }
            Err(e) => {
                self.job.error = Some(e.to_string());
                self.error_code = Some(codes::SUBMISSION_FAILED.to_string());
                self.transition(JobStatus::Error);
                Err(EngineError::Service(e))
            }
        }
    }

    /// Poll the service until the job reaches a terminal state.
    ///
    /// Returns the output for a completed job. Poll failures are retried
    /// with bounded exponential backoff; exhausting the budget, exceeding
    /// the wall-clock limit, or cancellation all end the loop.
    pub async fn poll_until_terminal(&mut self) -> Option<NodeOutput> {
        let mut consecutive_failures: u32 = 0;
        let mut output = None;

        while !self.job.status.is_terminal() {
            if self.cancel.is_cancelled() {
                self.finish_cancelled().await;
                break;
            }

            if let Some(deadline) = self.deadline {
                if tokio::time::Instant::now() >= deadline {
                    self.finish_timeout().await;
                    break;
                }
            }

            let cancel = self.cancel.clone();
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = cancel.cancelled() => {}
            }
            if self.cancel.is_cancelled() {
                self.finish_cancelled().await;
                break;
            }

            let job_id = match &self.job.job_id {
                Some(id) => id.clone(),
                // Not submitted; nothing to poll
                None => break,
            };

            match self.service.status(&job_id).await {
                Ok(response) => {
                    consecutive_failures = 0;
                    if let Some(out) = self.apply_status(response) {
                        output = Some(out);
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.max_poll_failures {
                        log::warn!(
                            "JobTracker: giving up on node '{}' after {} poll failures: {}",
                            self.job.node_id,
                            consecutive_failures,
                            e
                        );
                        self.job.error = Some(
                            EngineError::PollExhausted {
                                attempts: consecutive_failures,
                                last_error: e.to_string(),
                            }
                            .to_string(),
                        );
                        self.error_code = Some(codes::POLL_FAILED.to_string());
                        self.job.completed_at = Some(Utc::now());
                        self.transition(JobStatus::Error);
                        break;
                    }
                    let backoff = self.config.backoff_base
                        * 2u32.saturating_pow(consecutive_failures.saturating_sub(1));
                    log::debug!(
                        "JobTracker: poll failure {} for node '{}', backing off {:?}",
                        consecutive_failures,
                        self.job.node_id,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        output
    }

    /// Submit and poll to completion, consuming the tracker
    pub async fn execute(mut self, request: SubmitRequest) -> JobOutcome {
        let output = match self.submit(request).await {
            Ok(()) => self.poll_until_terminal().await,
            Err(_) => None,
        };
        JobOutcome {
            job: self.job,
            output,
            error_code: self.error_code,
        }
    }

    /// Apply one status response; returns the output on completion
    fn apply_status(&mut self, response: generation::JobStatusResponse) -> Option<NodeOutput> {
        if response.progress != self.job.progress {
            self.job.progress = response.progress;
            let _ = self
                .events
                .send(EngineEvent::job_progress(&self.job.node_id, response.progress));
        }

        match response.status {
            RemoteStatus::Pending | RemoteStatus::Queued => None,
            RemoteStatus::Processing => {
                if self.job.status == JobStatus::Queued {
                    self.transition(JobStatus::Running);
                }
                None
            }
            RemoteStatus::Completed => {
                self.job.progress = 100;
                self.job.completed_at = Some(Utc::now());
                self.transition(JobStatus::Completed);
                response.result
            }
            RemoteStatus::Failed => {
                let (code, message) = match response.error {
                    Some(err) => (err.code, err.message),
                    None => (
                        codes::JOB_FAILED.to_string(),
                        "Service reported failure without details".to_string(),
                    ),
                };
                self.job.error = Some(message);
                self.error_code = Some(code);
                self.job.completed_at = Some(Utc::now());
                self.transition(JobStatus::Error);
                None
            }
            RemoteStatus::Cancelled => {
                self.job.completed_at = Some(Utc::now());
                self.transition(JobStatus::Cancelled);
                None
            }
        }
    }

    async fn finish_cancelled(&mut self) {
        self.remote_cancel().await;
        self.job.completed_at = Some(Utc::now());
        self.error_code = Some(codes::CANCELLED.to_string());
        self.transition(JobStatus::Cancelled);
    }

    async fn finish_timeout(&mut self) {
        log::warn!(
            "JobTracker: node '{}' exceeded its {}s limit",
            self.job.node_id,
            self.config.max_duration.as_secs()
        );
        self.remote_cancel().await;
        self.job.error = Some(
            EngineError::Timeout {
                node: self.job.node_id.clone(),
                limit_secs: self.config.max_duration.as_secs(),
            }
            .to_string(),
        );
        self.error_code = Some(codes::TIMEOUT.to_string());
        self.job.completed_at = Some(Utc::now());
        self.transition(JobStatus::Error);
    }

    /// Best-effort remote cancellation
    async fn remote_cancel(&self) {
        if !self.service.supports_cancel() {
            return;
        }
        if let Some(job_id) = &self.job.job_id {
            if let Err(e) = self.service.cancel(job_id).await {
                log::debug!(
                    "JobTracker: remote cancel for job '{}' failed: {}",
                    job_id,
                    e
                );
            }
        }
    }

    fn transition(&mut self, to: JobStatus) {
        let from = self.job.status;
        self.job.status = to;
        let _ = self.events.send(EngineEvent::JobStatusChanged {
            node_id: self.job.node_id.clone(),
            from,
            to,
            progress: self.job.progress,
            error: self.job.error.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use generation::{
        JobHandle, JobStatusResponse, RemoteError, ServiceError, SubmitRequest,
    };

    use crate::events::{NullEventSink, VecEventSink};

    fn fast_config() -> JobConfig {
        JobConfig::default()
            .with_poll_interval(Duration::from_millis(5))
            .with_backoff_base(Duration::from_millis(1))
            .with_max_duration(Duration::from_secs(5))
    }

    fn request() -> SubmitRequest {
        SubmitRequest {
            node_type: "image-generation".to_string(),
            category: "processing".to_string(),
            parameters: HashMap::new(),
        }
    }

    /// Scripted service: completes after `polls_to_complete` status calls,
    /// or fails/ever-runs depending on `mode`.
    enum Mode {
        Complete,
        Fail,
        NeverFinish,
        PollError,
    }

    struct ScriptedService {
        mode: Mode,
        polls_to_complete: u32,
        polls: AtomicU32,
        cancels: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(mode: Mode) -> Self {
            Self {
                mode,
                polls_to_complete: 2,
                polls: AtomicU32::new(0),
                cancels: Mutex::new(Vec::new()),
            }
        }

        fn poll_count(&self) -> u32 {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        async fn submit(&self, request: SubmitRequest) -> generation::Result<JobHandle> {
            Ok(JobHandle {
                job_id: format!("job-{}", request.node_type),
            })
        }

        async fn status(&self, _job_id: &str) -> generation::Result<JobStatusResponse> {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.mode {
                Mode::PollError => Err(ServiceError::api(503, "unavailable")),
                Mode::NeverFinish => Ok(JobStatusResponse {
                    status: RemoteStatus::Processing,
                    progress: 50,
                    result: None,
                    error: None,
                }),
                Mode::Complete if polls >= self.polls_to_complete => Ok(JobStatusResponse {
                    status: RemoteStatus::Completed,
                    progress: 100,
                    result: Some(NodeOutput::asset("image", "https://cdn.example/out.png")),
                    error: None,
                }),
                Mode::Fail if polls >= self.polls_to_complete => Ok(JobStatusResponse {
                    status: RemoteStatus::Failed,
                    progress: 50,
                    result: None,
                    error: Some(RemoteError {
                        code: "nsfw_filter".to_string(),
                        message: "Content rejected".to_string(),
                    }),
                }),
                _ => Ok(JobStatusResponse {
                    status: RemoteStatus::Processing,
                    progress: 25,
                    result: None,
                    error: None,
                }),
            }
        }

        async fn cancel(&self, job_id: &str) -> generation::Result<()> {
            self.cancels.lock().unwrap().push(job_id.to_string());
            Ok(())
        }

        fn supports_cancel(&self) -> bool {
            true
        }
    }

    fn tracker(service: Arc<ScriptedService>) -> JobTracker {
        JobTracker::new(
            "node-1",
            service,
            fast_config(),
            Arc::new(NullEventSink),
            CancelToken::new(),
        )
    }

    #[tokio::test]
    async fn test_happy_path_completes_with_output() {
        let service = Arc::new(ScriptedService::new(Mode::Complete));
        let outcome = tracker(service).execute(request()).await;

        assert_eq!(outcome.job.status, JobStatus::Completed);
        assert_eq!(outcome.job.progress, 100);
        assert!(outcome.job.started_at.is_some());
        assert!(outcome.job.completed_at.is_some());
        assert_eq!(
            outcome.output.unwrap().url.as_deref(),
            Some("https://cdn.example/out.png")
        );
        assert!(outcome.error_code.is_none());
    }

    #[tokio::test]
    async fn test_service_failure_surfaces_code_and_message() {
        let service = Arc::new(ScriptedService::new(Mode::Fail));
        let outcome = tracker(service).execute(request()).await;

        assert_eq!(outcome.job.status, JobStatus::Error);
        assert_eq!(outcome.error_code.as_deref(), Some("nsfw_filter"));
        assert!(outcome.job.error.unwrap().contains("Content rejected"));
        assert!(outcome.output.is_none());
    }

    #[tokio::test]
    async fn test_submit_misuse_rejected_without_touching_job() {
        let service = Arc::new(ScriptedService::new(Mode::Complete));
        let mut tracker = tracker(service);

        tracker.submit(request()).await.unwrap();
        let job_id = tracker.job().job_id.clone();
        assert_eq!(tracker.job().status, JobStatus::Queued);

        let err = tracker.submit(request()).await.unwrap_err();
        assert!(matches!(err, EngineError::SubmitMisuse(_)));
        assert_eq!(tracker.job().job_id, job_id);
        assert_eq!(tracker.job().status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_cancel_stops_polling() {
        let service = Arc::new(ScriptedService::new(Mode::NeverFinish));
        let mut tracker = tracker(service.clone());
        let token = tracker.cancel_token();

        tracker.submit(request()).await.unwrap();

        let handle = tokio::spawn(async move {
            tracker.poll_until_terminal().await;
            tracker
        });
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        let tracker = handle.await.unwrap();

        assert_eq!(tracker.job().status, JobStatus::Cancelled);
        let polls_at_cancel = service.poll_count();
        // No further polls after cancellation
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(service.poll_count(), polls_at_cancel);
        // Remote cancellation was requested
        assert_eq!(
            service.cancels.lock().unwrap().as_slice(),
            &["job-image-generation".to_string()]
        );
    }

    #[tokio::test]
    async fn test_timeout_escalates_to_error_with_code() {
        let service = Arc::new(ScriptedService::new(Mode::NeverFinish));
        let mut t = JobTracker::new(
            "node-1",
            service.clone(),
            fast_config().with_max_duration(Duration::from_millis(20)),
            Arc::new(NullEventSink),
            CancelToken::new(),
        );

        t.submit(request()).await.unwrap();
        t.poll_until_terminal().await;

        assert_eq!(t.job().status, JobStatus::Error);
        assert!(t.job().error.as_ref().unwrap().contains("exceeded"));
        // Best-effort remote cancel on timeout
        assert!(!service.cancels.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poll_failures_escalate_after_budget() {
        let service = Arc::new(ScriptedService::new(Mode::PollError));
        let mut t = JobTracker::new(
            "node-1",
            service.clone(),
            fast_config().with_max_poll_failures(3),
            Arc::new(NullEventSink),
            CancelToken::new(),
        );

        t.submit(request()).await.unwrap();
        t.poll_until_terminal().await;

        assert_eq!(t.job().status, JobStatus::Error);
        assert_eq!(service.poll_count(), 3);
        assert!(t.job().error.as_ref().unwrap().contains("3 attempts"));
    }

    #[tokio::test]
    async fn test_status_transitions_emit_events() {
        let sink = Arc::new(VecEventSink::new());
        let service = Arc::new(ScriptedService::new(Mode::Complete));
        let t = JobTracker::new(
            "node-1",
            service,
            fast_config(),
            sink.clone(),
            CancelToken::new(),
        );

        t.execute(request()).await;

        let transitions: Vec<(JobStatus, JobStatus)> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::JobStatusChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (JobStatus::Idle, JobStatus::Queued),
                (JobStatus::Queued, JobStatus::Running),
                (JobStatus::Running, JobStatus::Completed),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_token_is_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        // Resolves immediately once cancelled
        clone.cancelled().await;
    }
}
