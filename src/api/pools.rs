// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Lending pool endpoints.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use rust_decimal::Decimal;

use super::{parse_body, required};
use crate::{
    error::ApiError,
    lending::funding_progress,
    models::{LendingPoolsResponse, PoolDetail, PoolDetailRequest, PoolDetailResponse},
    state::AppState,
};

/// List all lending pools, newest first.
#[utoipa::path(
    post,
    path = "/functions/v1/get-lending-pools",
    tag = "Pools",
    responses(
        (status = 200, description = "All pools", body = LendingPoolsResponse),
        (status = 500, description = "Store unavailable")
    )
)]
pub async fn get_lending_pools(
    State(state): State<AppState>,
) -> Result<Json<LendingPoolsResponse>, ApiError> {
    let pools = state.db.list_pools()?;
    Ok(Json(LendingPoolsResponse { pools }))
}

/// Get one pool with its total lent and funding progress.
#[utoipa::path(
    post,
    path = "/functions/v1/get-lending-pool-detail",
    tag = "Pools",
    request_body = PoolDetailRequest,
    responses(
        (status = 200, description = "Pool detail", body = PoolDetailResponse),
        (status = 400, description = "Missing pool id"),
        (status = 404, description = "Pool not found"),
        (status = 500, description = "Store unavailable")
    )
)]
pub async fn get_lending_pool_detail(
    State(state): State<AppState>,
    payload: Result<Json<PoolDetailRequest>, JsonRejection>,
) -> Result<Json<PoolDetailResponse>, ApiError> {
    let request: PoolDetailRequest = parse_body(payload)?;
    let id = required(request.id, "id")?;

    let pool = state
        .db
        .get_pool(&id)?
        .ok_or_else(|| ApiError::not_found("Pool not found"))?;

    let contributions = state.db.contributions_for_pool(&id)?;
    let total_lent = contributions
        .iter()
        .try_fold(Decimal::ZERO, |acc, c| acc.checked_add(c.amount))
        .ok_or_else(|| ApiError::internal("Pool total out of range"))?;
    let progress = funding_progress(total_lent, pool.target_amount);

    Ok(Json(PoolDetailResponse {
        pool: PoolDetail {
            pool,
            total_lent,
            funding_progress: progress,
            contribution_count: contributions.len(),
        },
    }))
}
