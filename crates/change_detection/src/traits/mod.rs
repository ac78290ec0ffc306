use std::future::Future;
use std::time::Duration;

use geo_common::GeoBounds;

use crate::{
    error::{CacheError, FetchError, Result},
    types::{ChangeMask, ChangedRegion, DifferenceOutput, NormalizedPair},
};

/// Trait for bringing two encoded snapshots onto a common grayscale grid
pub trait ImageNormalizer: Send + Sync {
    /// Decode, resize and convert both images to single-channel intensity
    fn normalize(&self, before: &[u8], after: &[u8]) -> Result<NormalizedPair>;
}

/// Trait for turning two intensity buffers into a binary change mask
pub trait ChangeDifferencer: Send + Sync {
    /// Compare `before` and `after` over a `width` x `height` grid.
    ///
    /// Buffers shorter than the grid must not be indexed past their end.
    fn difference(&self, before: &[u8], after: &[u8], width: u32, height: u32)
        -> Result<DifferenceOutput>;
}

/// Trait for grouping changed pixels into regions
pub trait RegionSegmenter: Send + Sync {
    /// Regions in discovery order
    fn segment(&self, mask: &ChangeMask) -> Result<Vec<ChangedRegion>>;
}

/// Source of raw imagery for an extent at a point in time
pub trait ImageryFetcher: Send + Sync {
    /// Fetch the encoded image covering `bounds` on `date`
    fn fetch(
        &self,
        bounds: &GeoBounds,
        date: &str,
    ) -> impl Future<Output = std::result::Result<Vec<u8>, FetchError>> + Send;
}

/// Text key/value store with per-entry expiry
pub trait CacheStore: Send + Sync {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = std::result::Result<Option<String>, CacheError>> + Send;

    /// Store `value` under `key`, expiring `ttl` after the write
    fn set_ex(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = std::result::Result<(), CacheError>> + Send;
}
