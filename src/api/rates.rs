// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Currency conversion endpoint.

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use super::{parse_body, required};
use crate::{
    error::ApiError, models::ConversionRateRequest, state::AppState, upstream::ConversionRate,
};

/// Quote a conversion rate, optionally converting an amount.
///
/// `source` is `fallback` when the live rate API failed and the static
/// table was used.
#[utoipa::path(
    post,
    path = "/functions/v1/get-conversion-rate",
    tag = "Rates",
    request_body = ConversionRateRequest,
    responses(
        (status = 200, description = "Conversion rate", body = ConversionRate),
        (status = 400, description = "Missing or unsupported currency"),
        (status = 500, description = "Rate lookup failed")
    )
)]
pub async fn get_conversion_rate(
    State(state): State<AppState>,
    payload: Result<Json<ConversionRateRequest>, JsonRejection>,
) -> Result<Json<ConversionRate>, ApiError> {
    let request: ConversionRateRequest = parse_body(payload)?;
    let from = required(request.from_currency, "fromCurrency")?;
    let to = required(request.to_currency, "toCurrency")?;

    if request.amount.is_some_and(|a| a.is_sign_negative()) {
        return Err(ApiError::bad_request("amount must not be negative"));
    }

    let quote = state
        .rates
        .conversion_rate(&from, &to, request.amount)
        .await?;
    Ok(Json(quote))
}
