//! Configuration types for the generation service client

use std::time::Duration;

/// Configuration for connecting to a generation service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the service (no trailing slash)
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8788".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ServiceConfig {
    /// Create a config pointing at the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert!(config.base_url.starts_with("http://"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_builder_methods() {
        let config = ServiceConfig::new("https://api.example.com")
            .with_request_timeout(Duration::from_secs(5));
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
