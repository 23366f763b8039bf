// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-user portfolio and profile endpoints.

use std::collections::HashMap;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::Utc;

use super::{parse_body, required};
use crate::{
    error::ApiError,
    lending::{PoolTerms, PortfolioEntry},
    models::{PortfolioResponse, ProfileResponse, UserRequest},
    state::AppState,
};

/// Get a user's contributions joined with pool terms and derived fields.
///
/// Entries whose pool no longer exists are returned without pool terms and
/// are never eligible.
#[utoipa::path(
    post,
    path = "/functions/v1/get-portfolio",
    tag = "Portfolio",
    request_body = UserRequest,
    responses(
        (status = 200, description = "User portfolio", body = PortfolioResponse),
        (status = 400, description = "Missing userId"),
        (status = 500, description = "Store unavailable")
    )
)]
pub async fn get_portfolio(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<PortfolioResponse>, ApiError> {
    let request: UserRequest = parse_body(payload)?;
    let user_id = required(request.user_id, "userId")?;

    let contributions = state.db.contributions_for_user(&user_id)?;

    let mut pools: HashMap<String, Option<PoolTerms>> = HashMap::new();
    let now = Utc::now();
    let mut portfolio = Vec::with_capacity(contributions.len());

    for contribution in contributions {
        let terms = match pools.get(&contribution.pool_id) {
            Some(terms) => terms.clone(),
            None => {
                let terms = state.db.get_pool(&contribution.pool_id)?.map(|p| p.terms());
                if terms.is_none() {
                    tracing::warn!(
                        pool_id = %contribution.pool_id,
                        contribution_id = %contribution.id,
                        "Contribution references a missing pool"
                    );
                }
                pools.insert(contribution.pool_id.clone(), terms.clone());
                terms
            }
        };
        portfolio.push(PortfolioEntry::new(contribution, terms).with_derived(now));
    }

    Ok(Json(PortfolioResponse { portfolio }))
}

/// Get a user's profile.
#[utoipa::path(
    post,
    path = "/functions/v1/get-profile",
    tag = "Portfolio",
    request_body = UserRequest,
    responses(
        (status = 200, description = "User profile", body = ProfileResponse),
        (status = 400, description = "Missing userId"),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Store unavailable")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    payload: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let request: UserRequest = parse_body(payload)?;
    let user_id = required(request.user_id, "userId")?;

    let profile = state
        .db
        .get_profile(&user_id)?
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(Json(ProfileResponse { profile }))
}
