use axum::{routing::post, Router};

use crate::handlers::leads::capture_lead;
use crate::state::AppState;

pub fn lead_routes() -> Router<AppState> {
    Router::new().route("/api/open-houses/:id/leads", post(capture_lead))
}
