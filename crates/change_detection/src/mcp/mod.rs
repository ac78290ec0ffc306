use crate::{
    cache::MemoryStore,
    config::DetectionConfig,
    imagery::{self, WmsFetcher},
    service::ChangeDetectionService,
    types::ChangeDetectionResult,
};
use geo_common::{DetectionRequest, UsageCounter};
use rmcp::{
    handler::server::tool::IntoCallToolResult, model::{CallToolResult, Content, ServerCapabilities, ServerInfo}, tool, Error as McpError, ServerHandler
};
use serde::Serialize;
use ts_rs::TS;
use std::sync::Arc;

/// `error` text of a failed detection
pub const DETECTION_FAILED: &str = "Failed to perform change detection";

/// Response envelope of the `detect_changes` tool
#[derive(Debug, Serialize, TS)]
#[ts(export)]
pub struct DetectionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ChangeDetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl DetectionResponse {
    fn ok(result: ChangeDetectionResult) -> Self {
        Self {
            success: true,
            data: Some(result),
            error: None,
            details: None,
        }
    }

    fn error(error: &str, details: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            details: Some(details),
        }
    }
}

/// Every failure shares one `error` text; the cause goes in `details`
impl From<crate::error::Result<ChangeDetectionResult>> for DetectionResponse {
    fn from(outcome: crate::error::Result<ChangeDetectionResult>) -> Self {
        match outcome {
            Ok(result) => Self::ok(result),
            Err(e) => Self::error(DETECTION_FAILED, e.to_string()),
        }
    }
}

impl IntoCallToolResult for DetectionResponse {
    fn into_call_tool_result(self) -> std::result::Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(&self).unwrap_or_else(|_| format!("{:?}", self)),
        )]))
    }
}

/// MCP Server exposing change detection and the imagery catalog
#[derive(Clone)]
pub struct ChangeDetectionMcpServer {
    service: Arc<ChangeDetectionService<WmsFetcher, MemoryStore>>,
    health_client: reqwest::Client,
}

impl ChangeDetectionMcpServer {
    pub fn new(config: &DetectionConfig) -> crate::error::Result<Self> {
        let store = config.cache.store();
        let fetcher = WmsFetcher::new(config.wms.clone())?;

        Ok(Self {
            service: Arc::new(ChangeDetectionService::new(fetcher, store)),
            health_client: imagery::health_client()?,
        })
    }

    /// Imagery requests issued by this server
    pub fn usage(&self) -> &UsageCounter {
        self.service.fetcher().usage()
    }

    /// Run a detection and wrap the outcome for the caller
    pub async fn run_detection(&self, request: &DetectionRequest) -> DetectionResponse {
        let outcome = self.service.detect(request).await;
        if let Err(e) = &outcome {
            tracing::error!("Change detection error: {}", e);
        }
        outcome.into()
    }
}

#[tool(tool_box)]
impl ChangeDetectionMcpServer {
    #[tool(description = "Detect changes between two dated imagery snapshots of a bounding box [minX, minY, maxX, maxY]")]
    async fn detect_changes(&self, #[tool(aggr)] request: DetectionRequest) -> DetectionResponse {
        self.run_detection(&request).await
    }

    #[tool(description = "List the free WMS imagery and XYZ tile services")]
    fn list_services(&self) -> String {
        let catalog = serde_json::json!({
            "wms": imagery::free_wms_services(),
            "tiles": imagery::free_tile_services(),
        });
        serde_json::to_string_pretty(&catalog)
            .unwrap_or_else(|e| format!("Failed to serialize catalog: {}", e))
    }

    #[tool(description = "Probe every WMS imagery service and report which ones are available")]
    async fn check_services(&self) -> String {
        let services = imagery::available_services(&self.health_client).await;
        serde_json::to_string_pretty(&services)
            .unwrap_or_else(|e| format!("Failed to serialize service status: {}", e))
    }

    #[tool(description = "Report imagery requests per provider since the last reset")]
    fn imagery_usage(&self) -> String {
        serde_json::to_string_pretty(&self.usage().snapshot())
            .unwrap_or_else(|e| format!("Failed to serialize usage: {}", e))
    }

    #[tool(description = "Reset the per-provider imagery request counters")]
    fn reset_imagery_usage(&self) -> String {
        self.usage().reset();
        "Imagery usage counters reset".to_string()
    }
}

#[tool(tool_box)]
impl ServerHandler for ChangeDetectionMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Change Detection Server - Compare two dated satellite snapshots of a bounding box and report changed regions, plus discovery and health checks for free imagery services.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChangeDetectionError;
    use geo_common::ValidationError;

    #[test]
    fn test_response_from_validation_error() {
        let response = DetectionResponse::from(Err::<ChangeDetectionResult, _>(
            ChangeDetectionError::Validation(ValidationError::BoundsLength(2)),
        ));
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some(DETECTION_FAILED));
        assert!(response.details.as_deref().unwrap().contains("4 numbers"));

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_response_from_pipeline_error() {
        let response = DetectionResponse::from(Err::<ChangeDetectionResult, _>(
            ChangeDetectionError::Task("worker panicked".to_string()),
        ));
        assert_eq!(response.error.as_deref(), Some(DETECTION_FAILED));
        assert!(response.details.unwrap().contains("worker panicked"));
    }

    #[tokio::test]
    async fn test_invalid_request_never_fetches() {
        let server = ChangeDetectionMcpServer::new(&DetectionConfig::default()).unwrap();
        let request = DetectionRequest {
            bounds: vec![0.0, 0.0, 100.0, 100.0],
            before_date: "2024-01-01".to_string(),
            after_date: "2023-01-01".to_string(),
        };

        let response = server.run_detection(&request).await;
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some(DETECTION_FAILED));
        assert!(response.details.as_deref().unwrap().contains("2024-01-01"));
        assert_eq!(server.usage().total(), 0);
    }
}
