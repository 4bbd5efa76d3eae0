//! Agent balance and ledger handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::ledger::{BalanceChange, BalanceSummary, CreditRequest, Ledger, Transaction};
use crate::models::{ApiResponse, PaginationParams};

pub async fn get_balance(
    State(ledger): State<Ledger>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<BalanceSummary>>> {
    let summary = ledger.summary(user_id).await?;
    Ok(Json(ApiResponse::ok(summary)))
}

/// Ledger history, newest first
pub async fn list_transactions(
    State(ledger): State<Ledger>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<Vec<Transaction>>>> {
    let history = ledger.history(user_id, page).await?;
    Ok(Json(ApiResponse::ok(history)))
}

/// Admin top-up of an agent's prepaid balance
pub async fn credit_balance(
    State(ledger): State<Ledger>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<CreditRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<BalanceChange>>)> {
    let change = ledger.credit(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(change))))
}
