use axum::{routing::get, Router};

use crate::handlers::catalog::{list_brands, list_regions};
use crate::state::AppState;

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/brands", get(list_brands))
        .route("/api/regions", get(list_regions))
}
