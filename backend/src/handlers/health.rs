use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, database) = match &state.database {
        Some(db) if db.is_healthy().await => (StatusCode::OK, "connected"),
        Some(_) => (StatusCode::SERVICE_UNAVAILABLE, "unreachable"),
        None => (StatusCode::OK, "in-memory"),
    };

    (
        status,
        Json(HealthResponse {
            status: if status.is_success() { "healthy" } else { "unhealthy" },
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
