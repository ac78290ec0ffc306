//! Free imagery providers offered to users, and their health checks.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{FetchError, Result};

/// Upper bound on a single health probe
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// A WMS endpoint that serves satellite or aerial imagery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MapServiceConfig {
    pub name: String,
    pub url: String,
    pub layers: String,
    pub format: String,
    pub max_zoom: u8,
    pub attribution: String,
    pub free: bool,
}

/// An XYZ tile template, e.g. `https://{a-c}.tile.openstreetmap.org/{z}/{x}/{y}.png`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TileServiceConfig {
    pub name: String,
    pub url: String,
    pub max_zoom: u8,
    pub attribution: String,
    pub free: bool,
}

/// A WMS service annotated with the outcome of its health probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ServiceStatus {
    #[serde(flatten)]
    pub service: MapServiceConfig,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AvailableServices {
    pub wms: Vec<ServiceStatus>,
    pub tiles: Vec<TileServiceConfig>,
}

fn wms(name: &str, url: &str, layers: &str, format: &str, max_zoom: u8, attribution: &str) -> MapServiceConfig {
    MapServiceConfig {
        name: name.to_string(),
        url: url.to_string(),
        layers: layers.to_string(),
        format: format.to_string(),
        max_zoom,
        attribution: attribution.to_string(),
        free: true,
    }
}

fn tiles(name: &str, url: &str, max_zoom: u8, attribution: &str) -> TileServiceConfig {
    TileServiceConfig {
        name: name.to_string(),
        url: url.to_string(),
        max_zoom,
        attribution: attribution.to_string(),
        free: true,
    }
}

/// Free WMS imagery services, in display order
pub fn free_wms_services() -> Vec<MapServiceConfig> {
    vec![
        wms(
            "NRW Germany DOP",
            "https://www.wms.nrw.de/geobasis/wms_nw_dop",
            "nw_dop",
            "image/png",
            19,
            "© NRW Germany",
        ),
        wms(
            "NASA Global Mosaic",
            "https://tiles.maps.eox.at/wms",
            "s2cloudless-2021_3857",
            "image/jpeg",
            14,
            "© NASA",
        ),
        wms(
            "USGS Satellite",
            "https://basemap.nationalmap.gov/arcgis/services/USGSImageryOnly/MapServer/WMSServer",
            "0",
            "image/jpeg",
            15,
            "© USGS",
        ),
        wms(
            "ESA Sentinel-2",
            "https://tiles.maps.eox.at/wms",
            "s2cloudless-2021_3857",
            "image/jpeg",
            14,
            "© ESA",
        ),
    ]
}

/// Free XYZ basemap tile services, in display order
pub fn free_tile_services() -> Vec<TileServiceConfig> {
    vec![
        tiles(
            "OpenStreetMap Standard",
            "https://{a-c}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            19,
            "© OpenStreetMap contributors",
        ),
        tiles(
            "Stamen Terrain",
            "https://stamen-tiles.a.ssl.fastly.net/terrain/{z}/{x}/{y}.jpg",
            18,
            "© Stamen Design",
        ),
        tiles(
            "CartoDB Voyager",
            "https://{a-d}.basemaps.cartocdn.com/rastertiles/voyager/{z}/{x}/{y}{r}.png",
            20,
            "© CartoDB",
        ),
        tiles(
            "OpenTopoMap",
            "https://{a-c}.tile.opentopomap.org/{z}/{x}/{y}.png",
            17,
            "© OpenTopoMap",
        ),
    ]
}

/// HTTP client for health probes
pub fn health_client() -> Result<Client> {
    Ok(Client::builder().timeout(HEALTH_CHECK_TIMEOUT).build()?)
}

/// A small world-extent `GetMap` request in web mercator
pub fn health_check_url(service: &MapServiceConfig) -> std::result::Result<Url, FetchError> {
    let mut url = Url::parse(&service.url)
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", service.url, e)))?;

    url.query_pairs_mut()
        .append_pair("service", "WMS")
        .append_pair("request", "GetMap")
        .append_pair("version", "1.3.0")
        .append_pair("layers", &service.layers)
        .append_pair("styles", "")
        .append_pair("crs", "EPSG:3857")
        .append_pair("bbox", "-2000000,-2000000,2000000,2000000")
        .append_pair("width", "256")
        .append_pair("height", "256")
        .append_pair("format", &service.format);

    Ok(url)
}

/// `true` only when the probe answers with HTTP 200
pub async fn check_health(client: &Client, service: &MapServiceConfig) -> bool {
    let url = match health_check_url(service) {
        Ok(url) => url,
        Err(e) => {
            warn!("Service {} health check failed: {}", service.name, e);
            return false;
        }
    };

    match client.get(url).send().await {
        Ok(response) if response.status() == StatusCode::OK => true,
        Ok(response) => {
            warn!("Service {} health check failed: HTTP {}", service.name, response.status());
            false
        }
        Err(e) => {
            warn!("Service {} health check failed: {}", service.name, e);
            false
        }
    }
}

/// Probe every service concurrently, keeping the input order
pub async fn check_services(client: &Client, services: Vec<MapServiceConfig>) -> Vec<ServiceStatus> {
    let mut probes = JoinSet::new();
    for (index, service) in services.iter().cloned().enumerate() {
        let client = client.clone();
        probes.spawn(async move {
            let available = check_health(&client, &service).await;
            (index, available)
        });
    }

    let mut available = vec![false; services.len()];
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok((index, ok)) => available[index] = ok,
            Err(e) => warn!("Health probe task failed: {}", e),
        }
    }

    services
        .into_iter()
        .zip(available)
        .map(|(service, available)| ServiceStatus { service, available })
        .collect()
}

/// All WMS services with their health, plus the tile services
pub async fn available_services(client: &Client) -> AvailableServices {
    let wms = check_services(client, free_wms_services()).await;
    info!(
        "{} of {} WMS services available",
        wms.iter().filter(|status| status.available).count(),
        wms.len()
    );

    AvailableServices {
        wms,
        tiles: free_tile_services(),
    }
}
