//! HTTP implementation of `GenerationService`
//!
//! Talks to the generation API over REST:
//!
//! - `POST   {base}/v1/jobs`             — submit a job
//! - `GET    {base}/v1/jobs/{id}`        — poll job status
//! - `POST   {base}/v1/jobs/{id}/cancel` — request cancellation

use async_trait::async_trait;

use crate::config::ServiceConfig;
use crate::service::{GenerationService, Result, ServiceError};
use crate::types::{JobHandle, JobStatusResponse, SubmitRequest};

/// Production `GenerationService` backed by an HTTP API
pub struct HttpGenerationService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpGenerationService {
    /// Create a new service client for the given configuration
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn jobs_url(&self) -> String {
        format!("{}/v1/jobs", self.config.base_url)
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/v1/jobs/{}", self.config.base_url, job_id)
    }

    /// Turn a non-success response into a `ServiceError::Api`
    async fn error_for(response: reqwest::Response) -> ServiceError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ServiceError::api(status, body)
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn submit(&self, request: SubmitRequest) -> Result<JobHandle> {
        log::debug!(
            "HttpGenerationService: submitting '{}' job to {}",
            request.node_type,
            self.jobs_url()
        );

        let response = self
            .client
            .post(self.jobs_url())
            .timeout(self.config.request_timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let handle: JobHandle = response.json().await?;
        log::debug!("HttpGenerationService: job '{}' accepted", handle.job_id);
        Ok(handle)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatusResponse> {
        let response = self
            .client
            .get(self.job_url(job_id))
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Ok(response.json().await?)
    }

    async fn cancel(&self, job_id: &str) -> Result<()> {
        log::debug!("HttpGenerationService: cancelling job '{}'", job_id);

        let response = self
            .client
            .post(format!("{}/cancel", self.job_url(job_id)))
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Ok(())
    }

    fn supports_cancel(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_construction() {
        let service = HttpGenerationService::new(ServiceConfig::new("https://api.example.com"));
        assert_eq!(service.jobs_url(), "https://api.example.com/v1/jobs");
        assert_eq!(
            service.job_url("job-42"),
            "https://api.example.com/v1/jobs/job-42"
        );
    }

    #[test]
    fn test_supports_cancel() {
        let service = HttpGenerationService::new(ServiceConfig::default());
        assert!(service.supports_cancel());
    }
}
