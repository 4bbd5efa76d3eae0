//! Gift issuance handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::gifts::{CreateGiftRequest, Gift, GiftService, OperatorRequest, SettlementOutcome};
use crate::models::{ApiResponse, PaginationParams};
use crate::state::AppState;

/// Interactive issuance; rate limited per agent
pub async fn create_gift(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<CreateGiftRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Gift>>)> {
    if !state.issuance_limiter.check(&user_id.to_string()).await {
        tracing::warn!(user_id = %user_id, "Gift issuance rate limit exceeded");
        return Err(ApiError::TooManyRequests);
    }

    let gift = state.gift_service.create_gift_link(user_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(gift))))
}

pub async fn list_gifts(
    State(gifts): State<GiftService>,
    Path(user_id): Path<Uuid>,
    Query(page): Query<PaginationParams>,
) -> ApiResult<Json<ApiResponse<Vec<Gift>>>> {
    let list = gifts.list_gifts(user_id, page).await?;
    Ok(Json(ApiResponse::ok(list)))
}

pub async fn get_gift(
    State(gifts): State<GiftService>,
    Path(gift_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Gift>>> {
    let gift = gifts.get_gift(gift_id).await?;
    Ok(Json(ApiResponse::ok(gift)))
}

pub async fn send_gift(
    State(gifts): State<GiftService>,
    Path(gift_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Gift>>> {
    let gift = gifts.send_gift(gift_id).await?;
    Ok(Json(ApiResponse::ok(gift)))
}

/// Deferred settlement of a Pending gift
pub async fn process_gift(
    State(gifts): State<GiftService>,
    Path(gift_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<SettlementOutcome>>> {
    let outcome = gifts.process_gift(gift_id).await?;
    Ok(Json(ApiResponse::ok(outcome)))
}

pub async fn cancel_gift(
    State(gifts): State<GiftService>,
    Path(gift_id): Path<Uuid>,
    Json(request): Json<OperatorRequest>,
) -> ApiResult<Json<ApiResponse<Gift>>> {
    let gift = gifts.cancel_gift(gift_id, request.actor_id).await?;
    Ok(Json(ApiResponse::ok(gift)))
}

pub async fn retry_claim_link(
    State(gifts): State<GiftService>,
    Path(gift_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Gift>>> {
    let gift = gifts.retry_claim_link(gift_id).await?;
    Ok(Json(ApiResponse::ok(gift)))
}

pub async fn refund_unlinked_gift(
    State(gifts): State<GiftService>,
    Path(gift_id): Path<Uuid>,
    Json(request): Json<OperatorRequest>,
) -> ApiResult<Json<ApiResponse<Gift>>> {
    let gift = gifts.refund_unlinked_gift(gift_id, request.actor_id).await?;
    Ok(Json(ApiResponse::ok(gift)))
}
