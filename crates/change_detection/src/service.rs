use std::sync::Arc;

use chrono::Utc;
use geo_common::{DetectionRequest, GeoBounds};
use tracing::{debug, info};

use crate::{
    cache::{CacheKey, CacheLookup, ResultCache},
    error::{ChangeDetectionError, Result},
    pipeline::Pipeline,
    traits::{CacheStore, ImageryFetcher},
    types::ChangeDetectionResult,
};

/// Cache-or-compute change detection over a pair of dated snapshots
pub struct ChangeDetectionService<F, S> {
    fetcher: F,
    cache: ResultCache<S>,
    pipeline: Arc<Pipeline>,
}

impl<F, S> ChangeDetectionService<F, S>
where
    F: ImageryFetcher,
    S: CacheStore,
{
    /// Create a service with the default pipeline
    pub fn new(fetcher: F, store: S) -> Self {
        Self::with_pipeline(fetcher, store, Pipeline::default())
    }

    pub fn with_pipeline(fetcher: F, store: S, pipeline: Pipeline) -> Self {
        Self {
            fetcher,
            cache: ResultCache::new(store),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn cache(&self) -> &ResultCache<S> {
        &self.cache
    }

    /// Validate a raw request, then run [`Self::detect_changes`]
    pub async fn detect(&self, request: &DetectionRequest) -> Result<ChangeDetectionResult> {
        let request = request.validate()?;
        self.detect_changes(&request.bounds, &request.before_date, &request.after_date)
            .await
    }

    /// Detect changes in `bounds` between `before_date` and `after_date`.
    ///
    /// A cached result is returned verbatim. Otherwise both snapshots are
    /// fetched concurrently and analyzed; any fetch or decode failure aborts
    /// the call and nothing is cached.
    pub async fn detect_changes(
        &self,
        bounds: &GeoBounds,
        before_date: &str,
        after_date: &str,
    ) -> Result<ChangeDetectionResult> {
        let key = CacheKey::new(bounds, before_date, after_date);

        if let CacheLookup::Hit(result) = self.cache.lookup(&key).await {
            info!("Cache hit for {}", key.as_str());
            return Ok(*result);
        }

        let (before_image, after_image) = tokio::try_join!(
            self.fetcher.fetch(bounds, before_date),
            self.fetcher.fetch(bounds, after_date),
        )?;
        debug!(
            "Fetched {} + {} bytes of imagery for {}",
            before_image.len(),
            after_image.len(),
            key.as_str()
        );

        let pipeline = Arc::clone(&self.pipeline);
        let (before_image, after_image, analysis) = tokio::task::spawn_blocking(move || {
            let analysis = pipeline.analyze(&before_image, &after_image);
            (before_image, after_image, analysis)
        })
        .await
        .map_err(|e| ChangeDetectionError::Task(e.to_string()))?;
        let analysis = analysis?;

        info!(
            "Detected {:.2}% change in {} region(s) for {}",
            analysis.change_percentage,
            analysis.changed_areas.len(),
            key.as_str()
        );

        let result = ChangeDetectionResult {
            change_percentage: analysis.change_percentage,
            changed_areas: analysis.changed_areas,
            before_image,
            after_image,
            difference_image: analysis.difference_image,
            timestamp: Utc::now(),
        };

        self.cache.put(&key, &result).await;
        Ok(result)
    }
}
