//! # Geo Common - Shared Types and Validation
//!
//! Dependency-light building blocks shared by the change detection crates:
//! bounding boxes in geographic and pixel space, request validation, and the
//! per-provider usage counter.
//!
//! ## Example
//!
//! ```rust
//! use geo_common::{DetectionRequest, GeoBounds};
//!
//! let request = DetectionRequest {
//!     bounds: vec![0.0, 0.0, 100.0, 100.0],
//!     before_date: "2023-01-01".to_string(),
//!     after_date: "2024-01-01".to_string(),
//! };
//! let validated = request.validate().unwrap();
//! assert_eq!(validated.bounds, GeoBounds::new(0.0, 0.0, 100.0, 100.0).unwrap());
//! assert_eq!(validated.bounds.to_string(), "0,0,100,100");
//! ```

pub mod bounds;
pub mod request;
pub mod usage;

use thiserror::Error;

// Re-exports for convenience
pub use bounds::{BoundingBox, GeoBounds, PixelBounds};
pub use chrono::{DateTime, Utc};
pub use request::{DetectionRequest, ValidatedRequest};
pub use usage::UsageCounter;

/// Result type for validation at the request boundary
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Malformed or missing input, rejected before any imagery is fetched
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Bounds must be an array of 4 numbers [minX, minY, maxX, maxY], got {0} values")]
    BoundsLength(usize),

    #[error("Bounds must contain finite numbers")]
    NonFiniteBounds,

    #[error("Inverted bounds: min{axis} is greater than max{axis}")]
    InvertedBounds { axis: &'static str },

    #[error("Invalid {field}: '{value}' is not a YYYY-MM-DD or RFC 3339 date")]
    InvalidDate { field: &'static str, value: String },

    #[error("beforeDate {before} is later than afterDate {after}")]
    DateOrder { before: String, after: String },
}
