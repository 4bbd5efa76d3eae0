use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::leads::{CaptureLeadRequest, LeadCaptureResult, LeadService};
use crate::models::ApiResponse;

/// Public sign-in form submission for an open house
pub async fn capture_lead(
    State(leads): State<LeadService>,
    Path(open_house_id): Path<Uuid>,
    Json(request): Json<CaptureLeadRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<LeadCaptureResult>>)> {
    let result = leads.capture_lead(open_house_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(result))))
}
