use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::kernel::ServerDeps;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    store: StoreHealth,
}

#[derive(Serialize)]
pub struct StoreHealth {
    backend: &'static str,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint
///
/// Returns 200 OK if the store answers within 5 seconds, 503 Service Unavailable otherwise.
pub async fn health_handler(
    Extension(deps): Extension<ServerDeps>,
) -> (StatusCode, Json<HealthResponse>) {
    let error = match tokio::time::timeout(std::time::Duration::from_secs(5), deps.health.ping()).await
    {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("Ping failed: {}", e)),
        Err(_) => Some("Ping timeout (>5s)".to_string()),
    };

    let is_healthy = error.is_none();
    let store = StoreHealth {
        backend: deps.health.backend(),
        status: if is_healthy { "ok" } else { "error" }.to_string(),
        error,
    };

    let (status_code, overall_status) = if is_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: overall_status.to_string(),
            store,
        }),
    )
}
