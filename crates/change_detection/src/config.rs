use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    cache::{DEFAULT_MAX_ENTRIES, MemoryStore},
    error::{ChangeDetectionError, Result},
};

pub const DEFAULT_WMS_BASE_URL: &str = "https://www.wms.nrw.de/geobasis/wms_nw_dop";
pub const DEFAULT_WMS_LAYER: &str = "nw_dop";
pub const DEFAULT_WMS_CRS: &str = "EPSG:25832";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for the detection service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub wms: WmsConfig,
    pub cache: CacheConfig,
}

/// Imagery provider endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WmsConfig {
    pub base_url: String,
    pub layer: String,
    pub crs: String,
    /// Upper bound on a single imagery request
    pub timeout_secs: u64,
}

impl Default for WmsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WMS_BASE_URL.to_string(),
            layer: DEFAULT_WMS_LAYER.to_string(),
            crs: DEFAULT_WMS_CRS.to_string(),
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl WmsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// In-process result store sizing. The entry TTL is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    pub fn store(&self) -> MemoryStore {
        MemoryStore::with_capacity_limit(self.max_entries)
    }
}

impl DetectionConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(ChangeDetectionError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply `WMS_BASE_URL`, `WMS_LAYER` and `WMS_CRS` from the environment
    pub fn apply_env(self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(base_url) = non_empty("WMS_BASE_URL") {
            self.wms.base_url = base_url;
        }
        if let Some(layer) = non_empty("WMS_LAYER") {
            self.wms.layer = layer;
        }
        if let Some(crs) = non_empty("WMS_CRS") {
            self.wms.crs = crs;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.wms.base_url, DEFAULT_WMS_BASE_URL);
        assert_eq!(config.wms.layer, "nw_dop");
        assert_eq!(config.wms.crs, "EPSG:25832");
        assert_eq!(config.wms.timeout(), Duration::from_secs(30));
        assert_eq!(config.cache.max_entries, DEFAULT_MAX_ENTRIES);
        assert_eq!(config.cache.store().capacity(), DEFAULT_MAX_ENTRIES);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DetectionConfig::from_toml(
            r#"
            [wms]
            layer = "nw_dop_rgb"

            [cache]
            max_entries = 64
            "#,
        )
        .expect("Should parse TOML");

        assert_eq!(config.wms.layer, "nw_dop_rgb");
        assert_eq!(config.wms.base_url, DEFAULT_WMS_BASE_URL);
        assert_eq!(config.cache.max_entries, 64);
        assert_eq!(config.cache.store().capacity(), 64);
    }

    #[test]
    fn test_json_and_toml_agree() {
        let mut config = DetectionConfig::default();
        config.wms.timeout_secs = 5;

        let from_json = DetectionConfig::from_json(&config.to_json().unwrap()).unwrap();
        let from_toml = DetectionConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(from_json, config);
        assert_eq!(from_toml, config);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = DetectionConfig::from_file("config.yaml").unwrap_err();
        assert!(matches!(err, ChangeDetectionError::UnsupportedFileFormat));
    }

    #[test]
    fn test_overrides() {
        let config = DetectionConfig::default().apply_overrides(|name| match name {
            "WMS_BASE_URL" => Some("http://localhost:8080/wms".to_string()),
            "WMS_CRS" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.wms.base_url, "http://localhost:8080/wms");
        assert_eq!(config.wms.crs, DEFAULT_WMS_CRS);
        assert_eq!(config.wms.layer, DEFAULT_WMS_LAYER);
    }
}
