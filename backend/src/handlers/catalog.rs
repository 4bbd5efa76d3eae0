//! Brand catalog handlers

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::models::ApiResponse;
use crate::provider::{Brand, BrandCatalog, Region};

#[derive(Debug, Deserialize)]
pub struct BrandsQuery {
    pub region: Option<String>,
}

pub async fn list_brands(
    State(catalog): State<BrandCatalog>,
    Query(query): Query<BrandsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Brand>>>> {
    let region = query.region.as_deref().filter(|r| !r.is_empty());
    let brands = catalog.brands(region).await?;
    Ok(Json(ApiResponse::ok(brands)))
}

pub async fn list_regions(
    State(catalog): State<BrandCatalog>,
) -> ApiResult<Json<ApiResponse<Vec<Region>>>> {
    let regions = catalog.regions().await?;
    Ok(Json(ApiResponse::ok(regions)))
}
