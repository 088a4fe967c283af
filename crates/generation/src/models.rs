//! TTL-cached registry of the models the generation service offers
//!
//! The catalog fetches `GET {base}/v1/models` through a `ModelSource`,
//! caches the result for a configurable TTL, and falls back to a built-in
//! list when the remote fetch fails. Cache lifetime is explicit — callers
//! can `invalidate()` or `refresh()` at any time; there is no process-global
//! state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::ServiceConfig;
use crate::service::{Result, ServiceError};

/// A model the generation service can run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Stable model identifier (e.g., "flux-dev")
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Output kind this model produces (e.g., "image", "video")
    pub output: String,
}

impl ModelInfo {
    /// Create a new model entry
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            output: output.into(),
        }
    }
}

/// Built-in fallback list, used when the remote catalog is unreachable
static FALLBACK_MODELS: Lazy<Vec<ModelInfo>> = Lazy::new(|| {
    vec![
        ModelInfo::new("flux-dev", "Flux Dev", "image"),
        ModelInfo::new("flux-schnell", "Flux Schnell", "image"),
        ModelInfo::new("sdxl-turbo", "SDXL Turbo", "image"),
        ModelInfo::new("kling-standard", "Kling Standard", "video"),
        ModelInfo::new("stable-audio", "Stable Audio", "audio"),
    ]
});

/// Where the catalog fetches its model list from
#[async_trait]
pub trait ModelSource: Send + Sync {
    /// Fetch the current model list
    async fn fetch_models(&self) -> Result<Vec<ModelInfo>>;
}

/// HTTP-backed model source hitting `GET {base}/v1/models`
pub struct HttpModelSource {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpModelSource {
    /// Create a source for the given service configuration
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl ModelSource for HttpModelSource {
    async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/v1/models", self.config.base_url);
        log::debug!("HttpModelSource: fetching model list from {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::api(status, body));
        }

        Ok(response.json().await?)
    }
}

struct CachedModels {
    models: Vec<ModelInfo>,
    fetched_at: Instant,
}

/// TTL-cached model catalog
///
/// `models()` serves from cache while fresh, refreshes when stale, and
/// falls back to the built-in list (without caching it) when the source
/// errors, so the next call retries the remote.
pub struct ModelCatalog {
    source: Arc<dyn ModelSource>,
    ttl: Duration,
    cache: RwLock<Option<CachedModels>>,
}

impl ModelCatalog {
    /// Create a catalog over the given source with the default 5-minute TTL
    pub fn new(source: Arc<dyn ModelSource>) -> Self {
        Self {
            source,
            ttl: Duration::from_secs(300),
            cache: RwLock::new(None),
        }
    }

    /// Set the cache time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Get the model list, refreshing the cache if it is stale
    pub async fn models(&self) -> Vec<ModelInfo> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return cached.models.clone();
                }
            }
        }

        match self.refresh().await {
            Ok(models) => models,
            Err(e) => {
                log::warn!(
                    "ModelCatalog: remote fetch failed ({}), using fallback list",
                    e
                );
                FALLBACK_MODELS.clone()
            }
        }
    }

    /// Force a refresh from the source, updating the cache on success
    pub async fn refresh(&self) -> Result<Vec<ModelInfo>> {
        let models = self.source.fetch_models().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(CachedModels {
            models: models.clone(),
            fetched_at: Instant::now(),
        });
        Ok(models)
    }

    /// Drop the cached list; the next `models()` call refetches
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSource {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelSource for CountingSource {
        async fn fetch_models(&self) -> Result<Vec<ModelInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ServiceError::api(503, "unavailable"))
            } else {
                Ok(vec![ModelInfo::new("remote-model", "Remote Model", "image")])
            }
        }
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let source = Arc::new(CountingSource::new(false));
        let catalog = ModelCatalog::new(source.clone()).with_ttl(Duration::from_secs(60));

        let first = catalog.models().await;
        let second = catalog.models().await;
        assert_eq!(first, second);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let source = Arc::new(CountingSource::new(false));
        let catalog = ModelCatalog::new(source.clone()).with_ttl(Duration::from_secs(60));

        catalog.models().await;
        catalog.invalidate().await;
        catalog.models().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_refetches() {
        let source = Arc::new(CountingSource::new(false));
        let catalog = ModelCatalog::new(source.clone()).with_ttl(Duration::ZERO);

        catalog.models().await;
        catalog.models().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_fallback_on_source_error() {
        let source = Arc::new(CountingSource::new(true));
        let catalog = ModelCatalog::new(source.clone());

        let models = catalog.models().await;
        assert_eq!(models, *FALLBACK_MODELS);

        // Fallback is not cached — the next call retries the remote
        catalog.models().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_surfaces_errors() {
        let source = Arc::new(CountingSource::new(true));
        let catalog = ModelCatalog::new(source);
        assert!(catalog.refresh().await.is_err());
    }
}
