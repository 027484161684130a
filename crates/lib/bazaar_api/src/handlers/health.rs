//! Health check endpoint.

use axum::Json;

use crate::models::HealthResponse;

/// `GET /health` — liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: bazaar_core::version().to_string(),
    })
}
