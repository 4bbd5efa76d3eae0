//! Per-gift lifecycle routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::gifts::{
    cancel_gift, get_gift, process_gift, refund_unlinked_gift, retry_claim_link, send_gift,
};
use crate::state::AppState;

pub fn gift_routes() -> Router<AppState> {
    Router::new()
        .route("/api/gifts/:id", get(get_gift))
        .route("/api/gifts/:id/send", post(send_gift))
        .route("/api/gifts/:id/process", post(process_gift))
        .route("/api/gifts/:id/cancel", post(cancel_gift))
        .route("/api/gifts/:id/retry-link", post(retry_claim_link))
        .route("/api/gifts/:id/refund", post(refund_unlinked_gift))
}
