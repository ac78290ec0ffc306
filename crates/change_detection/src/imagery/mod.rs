pub mod catalog;
pub mod wms;

pub use catalog::{
    AvailableServices, MapServiceConfig, ServiceStatus, TileServiceConfig, available_services,
    check_health, check_services, free_tile_services, free_wms_services, health_client,
};
pub use wms::{IMAGE_SIZE, WmsFetcher};
