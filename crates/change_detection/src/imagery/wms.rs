//! WMS `GetMap` client used as the imagery collaborator.

use std::sync::Arc;

use geo_common::{GeoBounds, UsageCounter};
use reqwest::{Client, Url};
use tracing::debug;

use crate::{
    config::WmsConfig,
    error::{FetchError, Result},
    traits::ImageryFetcher,
};

/// Edge length of every requested image, in pixels
pub const IMAGE_SIZE: u32 = 512;

/// Fetches dated imagery from a WMS 1.3.0 endpoint
#[derive(Debug, Clone)]
pub struct WmsFetcher {
    client: Client,
    config: WmsConfig,
    usage: Arc<UsageCounter>,
}

impl WmsFetcher {
    /// Create a fetcher with its own usage counter
    pub fn new(config: WmsConfig) -> Result<Self> {
        Self::with_usage_counter(config, Arc::new(UsageCounter::new()))
    }

    /// Create a fetcher that records requests into a shared counter
    pub fn with_usage_counter(config: WmsConfig, usage: Arc<UsageCounter>) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            config,
            usage,
        })
    }

    pub fn usage(&self) -> &Arc<UsageCounter> {
        &self.usage
    }

    pub fn config(&self) -> &WmsConfig {
        &self.config
    }

    /// The `GetMap` URL for `bounds` on `date`
    pub fn get_map_url(&self, bounds: &GeoBounds, date: &str) -> std::result::Result<Url, FetchError> {
        get_map_url(&self.config, bounds, date)
    }
}

/// Build a WMS 1.3.0 `GetMap` request for a 512x512 PNG
pub fn get_map_url(
    config: &WmsConfig,
    bounds: &GeoBounds,
    date: &str,
) -> std::result::Result<Url, FetchError> {
    let mut url = Url::parse(&config.base_url)
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

    url.query_pairs_mut()
        .append_pair("SERVICE", "WMS")
        .append_pair("REQUEST", "GetMap")
        .append_pair("VERSION", "1.3.0")
        .append_pair("LAYERS", &config.layer)
        .append_pair("STYLES", "")
        .append_pair("CRS", &config.crs)
        .append_pair("BBOX", &bounds.to_string())
        .append_pair("WIDTH", &IMAGE_SIZE.to_string())
        .append_pair("HEIGHT", &IMAGE_SIZE.to_string())
        .append_pair("FORMAT", "image/png")
        .append_pair("TIME", date);

    Ok(url)
}

impl ImageryFetcher for WmsFetcher {
    async fn fetch(&self, bounds: &GeoBounds, date: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let url = self.get_map_url(bounds, date)?;
        self.usage.record(url.host_str().unwrap_or("unknown"));
        debug!("Requesting imagery for {} at {}", bounds, date);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        debug!("Received {} bytes of imagery for {}", bytes.len(), date);
        Ok(bytes.to_vec())
    }
}
