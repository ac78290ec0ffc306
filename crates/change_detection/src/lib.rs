//! # Change Detection Library
//!
//! Compares two satellite snapshots of the same extent taken at different
//! times and reports where they differ.
//!
//! ## Core Features
//!
//! - **Trait-based Architecture**: normalizer, difference engine and region
//!   segmenter are swappable behind traits
//! - **Fixed Detection Rule**: grayscale absolute difference, threshold 30,
//!   4-connected regions of at least 10 pixels
//! - **Result Cache**: results are memoized for an hour per
//!   (bounds, before date, after date) in a bounded LRU store
//! - **WMS Imagery**: dated `GetMap` requests with a provider catalog and
//!   health checks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use change_detection::{ChangeDetectionService, MemoryStore, WmsFetcher, config::DetectionConfig};
//! use geo_common::GeoBounds;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DetectionConfig::default();
//! let service = ChangeDetectionService::new(WmsFetcher::new(config.wms)?, MemoryStore::new());
//!
//! let bounds = GeoBounds::new(350000.0, 5600000.0, 350512.0, 5600512.0)?;
//! let result = service.detect_changes(&bounds, "2021-06-01", "2023-06-01").await?;
//! println!("{:.2}% changed in {} regions", result.change_percentage, result.changed_areas.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Offline Comparison
//!
//! ```rust,no_run
//! use change_detection::Pipeline;
//!
//! let before = std::fs::read("before.png")?;
//! let after = std::fs::read("after.png")?;
//! let analysis = Pipeline::default().analyze(&before, &after)?;
//! std::fs::write("difference.png", &analysis.difference_image)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod cache;
pub mod config;
pub mod imagery;
pub mod service;
pub mod mcp;

// Re-exports for convenience
pub use error::{ChangeDetectionError, CacheError, FetchError, Result};
pub use types::{ChangeAnalysis, ChangeDetectionResult, ChangeMask, ChangedRegion, ImageRole};
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{Pipeline, builder::PipelineBuilder};
pub use cache::{CacheKey, CacheLookup, MemoryStore, ResultCache, CACHE_TTL, DEFAULT_MAX_ENTRIES};
pub use imagery::WmsFetcher;
pub use service::ChangeDetectionService;
