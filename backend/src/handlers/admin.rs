//! Operator endpoints: unlinked gifts, reconciliation and provider funds

use std::time::Duration;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::gifts::{Gift, GiftService, ReconciliationReport, UnlinkedGiftsQuery};
use crate::models::ApiResponse;

const DEFAULT_UNLINKED_AGE_MINUTES: i64 = 5;
const DEFAULT_RECONCILE_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ReconcileQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProviderFunds {
    /// `None` when the provider could not be reached
    pub balance_in_cents: Option<i64>,
}

pub async fn list_unlinked_gifts(
    State(gifts): State<GiftService>,
    Query(query): Query<UnlinkedGiftsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Gift>>>> {
    let minutes = query
        .older_than_minutes
        .unwrap_or(DEFAULT_UNLINKED_AGE_MINUTES);
    if minutes < 0 {
        return Err(ApiError::BadRequest(
            "older_than_minutes must not be negative".to_string(),
        ));
    }

    let list = gifts
        .unlinked_gifts(Duration::from_secs(minutes as u64 * 60))
        .await?;
    Ok(Json(ApiResponse::ok(list)))
}

pub async fn reconciliation(
    State(gifts): State<GiftService>,
    Query(query): Query<ReconcileQuery>,
) -> ApiResult<Json<ApiResponse<ReconciliationReport>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECONCILE_LIMIT).clamp(1, 1000);
    let report = gifts.reconcile(limit).await?;
    Ok(Json(ApiResponse::ok(report)))
}

pub async fn provider_funds(State(gifts): State<GiftService>) -> Json<ApiResponse<ProviderFunds>> {
    Json(ApiResponse::ok(ProviderFunds {
        balance_in_cents: gifts.provider_funds().await,
    }))
}
