//! Agent balance, ledger and gift list routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::gifts::{create_gift, list_gifts};
use crate::handlers::ledger::{credit_balance, get_balance, list_transactions};
use crate::state::AppState;

pub fn agent_routes() -> Router<AppState> {
    Router::new()
        .route("/api/agents/:user_id/balance", get(get_balance))
        .route("/api/agents/:user_id/transactions", get(list_transactions))
        .route("/api/agents/:user_id/credits", post(credit_balance))
        .route(
            "/api/agents/:user_id/gifts",
            get(list_gifts).post(create_gift),
        )
}
