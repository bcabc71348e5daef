use axum::Json;
use serde::Serialize;

/// Liveness payload. Cache and limiter are in-process, so being able to
/// answer is the whole check.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl HealthResponse {
    pub const fn up() -> Self {
        Self {
            status: "UP",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::up())
}
