// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Third-party APIs proxied by the remote data functions.
//!
//! - `chain_data` - ERC-20 balances per wallet and chain
//! - `rates` - conversion rates, with a static fallback table

pub mod chain_data;
pub mod rates;

pub use chain_data::{format_units, Chain, ChainDataClient, TokenBalance, DEFAULT_CHAIN_DATA_API_URL};
pub use rates::{
    fallback_rate, ConversionRate, RateClient, DEFAULT_RATE_API_URL, SOURCE_FALLBACK, SOURCE_LIVE,
    STATIC_USD_RATES,
};

/// Errors from upstream APIs.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("Upstream request failed: {0}")]
    Request(String),

    #[error("Upstream returned HTTP {0}")]
    Status(u16),

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),
}
