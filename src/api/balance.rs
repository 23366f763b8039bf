// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token and USDC balance endpoints backed by the chain-data API.

use std::collections::HashMap;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{parse_body, required};
use crate::{
    error::ApiError,
    models::{
        ChainBalance, PricedToken, TokenBalanceRequest, TokenBalanceResponse, UsdcBalanceRequest,
        UsdcBalanceResponse, WalletAddress,
    },
    state::AppState,
    upstream::{Chain, UpstreamError},
};

fn wallet_address(raw: Option<String>) -> Result<WalletAddress, ApiError> {
    let address = WalletAddress::from(required(raw, "walletAddress")?);
    if !address.is_valid() {
        return Err(ApiError::bad_request(format!(
            "Invalid wallet address: {address}"
        )));
    }
    Ok(address)
}

/// Get every ERC-20 balance of a wallet on one chain, valued in USD.
///
/// Valuation uses live rates when available and the static table otherwise;
/// symbols unknown to both are returned without a USD value.
#[utoipa::path(
    post,
    path = "/functions/v1/get-token-balance",
    tag = "Balances",
    request_body = TokenBalanceRequest,
    responses(
        (status = 200, description = "Token balances", body = TokenBalanceResponse),
        (status = 400, description = "Missing or invalid walletAddress or chain"),
        (status = 500, description = "Chain-data API unavailable")
    )
)]
pub async fn get_token_balance(
    State(state): State<AppState>,
    payload: Result<Json<TokenBalanceRequest>, JsonRejection>,
) -> Result<Json<TokenBalanceResponse>, ApiError> {
    let request: TokenBalanceRequest = parse_body(payload)?;
    let address = wallet_address(request.wallet_address)?;
    let chain_raw = required(request.chain, "chain")?;
    let chain = Chain::parse(&chain_raw)
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported chain: {chain_raw}")))?;

    let balances = state
        .chain_data
        .token_balances(address.as_str(), chain)
        .await?;

    let mut prices: HashMap<String, Option<Decimal>> = HashMap::new();
    let mut tokens = Vec::with_capacity(balances.len());
    let mut total_usd = Decimal::ZERO;

    for token in balances {
        let symbol = token.symbol.to_ascii_uppercase();
        let price = match prices.get(&symbol) {
            Some(price) => *price,
            None => {
                let price = match state.rates.usd_price(&symbol).await {
                    Ok(price) => Some(price),
                    Err(UpstreamError::UnsupportedCurrency(_)) => {
                        debug!(%symbol, "No USD rate for token");
                        None
                    }
                    Err(e) => {
                        warn!(%symbol, error = %e, "USD valuation failed");
                        None
                    }
                };
                prices.insert(symbol, price);
                price
            }
        };

        let usd_value = price.and_then(|p| match token.balance.checked_mul(p) {
            Some(value) => Some(value.round_dp(2)),
            None => {
                warn!(symbol = %token.symbol, "USD value out of range");
                None
            }
        });
        total_usd = total_usd.saturating_add(usd_value.unwrap_or_default());
        tokens.push(PricedToken { token, usd_value });
    }

    Ok(Json(TokenBalanceResponse {
        wallet_address: address,
        chain,
        tokens,
        total_usd,
    }))
}

/// Get a wallet's USDC balance across all supported chains.
///
/// Chains whose lookup fails are listed under `unavailable`; the request
/// only fails when every chain does.
#[utoipa::path(
    post,
    path = "/functions/v1/get-usdc-balance",
    tag = "Balances",
    request_body = UsdcBalanceRequest,
    responses(
        (status = 200, description = "USDC balances", body = UsdcBalanceResponse),
        (status = 400, description = "Missing or invalid walletAddress"),
        (status = 500, description = "Chain-data API unavailable")
    )
)]
pub async fn get_usdc_balance(
    State(state): State<AppState>,
    payload: Result<Json<UsdcBalanceRequest>, JsonRejection>,
) -> Result<Json<UsdcBalanceResponse>, ApiError> {
    let request: UsdcBalanceRequest = parse_body(payload)?;
    let address = wallet_address(request.wallet_address)?;
    let client = &state.chain_data;
    let wallet = address.as_str();

    let (eth, base, polygon, arbitrum) = tokio::join!(
        client.usdc_balance(wallet, Chain::Eth),
        client.usdc_balance(wallet, Chain::Base),
        client.usdc_balance(wallet, Chain::Polygon),
        client.usdc_balance(wallet, Chain::Arbitrum),
    );

    let mut balances = Vec::new();
    let mut unavailable = Vec::new();
    for (chain, result) in [
        (Chain::Eth, eth),
        (Chain::Base, base),
        (Chain::Polygon, polygon),
        (Chain::Arbitrum, arbitrum),
    ] {
        match result {
            Ok(balance) => balances.push(ChainBalance { chain, balance }),
            Err(e) => {
                warn!(%chain, error = %e, "USDC lookup failed");
                unavailable.push(chain);
            }
        }
    }

    if balances.is_empty() {
        return Err(ApiError::internal("Chain data unavailable"));
    }

    let total = balances
        .iter()
        .fold(Decimal::ZERO, |acc, b| acc.saturating_add(b.balance));
    Ok(Json(UsdcBalanceResponse {
        wallet_address: address,
        balances,
        total,
        unavailable,
    }))
}
