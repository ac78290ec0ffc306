use geo_common::ValidationError;
use thiserror::Error;

use crate::types::ImageRole;

#[derive(Error, Debug)]
pub enum ChangeDetectionError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to fetch imagery: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to decode {role} image: {source}")]
    Decode {
        role: ImageRole,
        #[source]
        source: image::ImageError,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Analysis task failed: {0}")]
    Task(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Unsupported config format. Please use .toml or .json files")]
    UnsupportedFileFormat,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of the imagery collaborator. Aborts the whole detection.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("imagery request to {url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("imagery transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid imagery URL: {0}")]
    InvalidUrl(String),
}

/// Failure of the cache store. Never surfaces to callers of the service.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, ChangeDetectionError>;
