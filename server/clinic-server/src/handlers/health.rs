use axum::{extract::State, Json};
use database_layer::DatabasePool;
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::error::{api_success, ApiError, ApiResponse};
use crate::server::ClinicServer;

/// Health check response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall system health status
    #[schema(example = "healthy")]
    pub status: String,
    /// Current timestamp in RFC3339 format
    #[schema(example = "2025-01-15T10:30:00Z")]
    pub timestamp: String,
    /// API version
    #[schema(example = "0.1.0")]
    pub version: String,
    /// Individual dependency checks
    pub checks: HashMap<String, String>,
}

/// Version information response
#[derive(Debug, Serialize, ToSchema)]
pub struct VersionResponse {
    #[schema(example = "clinic-server")]
    pub name: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// API modules served by this build
    pub features: Vec<String>,
}

/// System status response
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "Clinic Engine")]
    pub server_name: String,
    /// Whether the database answered a probe query
    pub database_connected: bool,
    /// Open connections held by the pool
    pub pool_size: u32,
    pub idle_connections: usize,
    /// Clinic wall-clock offset from UTC in minutes
    #[schema(example = -360)]
    pub utc_offset_minutes: i32,
    pub redaction_enabled: bool,
}

/// Health check handler
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health report, `degraded` when the database is unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(
    State(server): State<ClinicServer>,
) -> Result<Json<ApiResponse<HealthResponse>>, ApiError> {
    let database_ok = DatabasePool::from_pool(server.db_pool.clone()).is_healthy().await;

    let mut checks = HashMap::new();
    checks.insert(
        "database".to_string(),
        if database_ok { "healthy" } else { "unhealthy" }.to_string(),
    );

    let response = HealthResponse {
        status: if database_ok { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    };

    Ok(Json(api_success(response)))
}

/// Version information handler
#[utoipa::path(
    get,
    path = "/version",
    tag = "health",
    responses(
        (status = 200, description = "Version information retrieved successfully", body = VersionResponse)
    )
)]
pub async fn version_info() -> Result<Json<ApiResponse<VersionResponse>>, ApiError> {
    let features = [
        "identity",
        "scheduling",
        "appointments",
        "treatments",
        "billing",
        "clinical-records",
        "consent",
    ]
    .iter()
    .map(|feature| feature.to_string())
    .collect();

    Ok(Json(api_success(VersionResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features,
    })))
}

/// System status handler
#[utoipa::path(
    get,
    path = "/status",
    tag = "health",
    responses(
        (status = 200, description = "System status retrieved successfully", body = StatusResponse)
    )
)]
pub async fn system_status(
    State(server): State<ClinicServer>,
) -> Result<Json<ApiResponse<StatusResponse>>, ApiError> {
    let database_connected = DatabasePool::from_pool(server.db_pool.clone()).is_healthy().await;
    let config = server.get_config();

    Ok(Json(api_success(StatusResponse {
        server_name: config.server.name.clone(),
        database_connected,
        pool_size: server.db_pool.size(),
        idle_connections: server.db_pool.num_idle(),
        utc_offset_minutes: config.clinic.utc_offset_minutes,
        redaction_enabled: config.logging.redaction_enabled,
    })))
}
