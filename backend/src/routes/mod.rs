//! Route definitions for the rewards API

mod admin;
mod agents;
mod catalog;
mod gifts;
mod leads;

use axum::{routing::get, Router};

pub use admin::admin_routes;
pub use agents::agent_routes;
pub use catalog::catalog_routes;
pub use gifts::gift_routes;
pub use leads::lead_routes;

use crate::handlers::health_check;
use crate::middleware::request_tracing;
use crate::state::AppState;

/// Full API router with request tracing applied. CORS is layered on by the
/// binary since it depends on deployment configuration.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(agent_routes())
        .merge(gift_routes())
        .merge(admin_routes())
        .merge(catalog_routes())
        .merge(lead_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(request_tracing))
}
