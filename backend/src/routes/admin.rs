use axum::{routing::get, Router};

use crate::handlers::admin::{list_unlinked_gifts, provider_funds, reconciliation};
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/gifts/unlinked", get(list_unlinked_gifts))
        .route("/api/admin/reconciliation", get(reconciliation))
        .route("/api/admin/provider/funds", get(provider_funds))
}
