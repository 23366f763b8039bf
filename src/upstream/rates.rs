// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Currency conversion rates with a static fallback table.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::UpstreamError;

/// Default rate API root. Rates are fetched from `{root}/latest/{FROM}`.
pub const DEFAULT_RATE_API_URL: &str = "https://open.er-api.com/v6";

pub const SOURCE_LIVE: &str = "live";
pub const SOURCE_FALLBACK: &str = "fallback";

/// USD value of one unit of each currency, used when the live API fails.
pub const STATIC_USD_RATES: &[(&str, Decimal)] = &[
    ("USD", dec!(1)),
    ("USDC", dec!(1)),
    ("USDT", dec!(1)),
    ("DAI", dec!(1)),
    ("EUR", dec!(1.08)),
    ("GBP", dec!(1.27)),
    ("CHF", dec!(1.12)),
    ("JPY", dec!(0.0067)),
    ("CAD", dec!(0.73)),
    ("AUD", dec!(0.65)),
    ("NGN", dec!(0.00065)),
    ("KES", dec!(0.0077)),
    ("ETH", dec!(3000)),
    ("WETH", dec!(3000)),
    ("BTC", dec!(60000)),
    ("MATIC", dec!(0.70)),
    ("POL", dec!(0.70)),
    ("ARB", dec!(0.80)),
    ("AVAX", dec!(30)),
];

/// A quoted conversion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRate {
    /// Units of `to_currency` per unit of `from_currency`
    pub rate: Decimal,
    pub from_currency: String,
    pub to_currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converted_amount: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    /// `live` or `fallback`
    pub source: String,
}

impl ConversionRate {
    fn new(
        from: &str,
        to: &str,
        rate: Decimal,
        amount: Option<Decimal>,
        source: &str,
    ) -> Result<Self, UpstreamError> {
        let converted_amount = match amount {
            Some(a) => Some(
                a.checked_mul(rate)
                    .ok_or_else(|| UpstreamError::AmountOutOfRange(a.to_string()))?
                    .round_dp(8),
            ),
            None => None,
        };
        Ok(Self {
            rate,
            from_currency: from.to_string(),
            to_currency: to.to_string(),
            amount,
            converted_amount,
            timestamp: Utc::now(),
            source: source.to_string(),
        })
    }
}

fn static_usd_rate(currency: &str) -> Option<Decimal> {
    STATIC_USD_RATES
        .iter()
        .find(|(code, _)| *code == currency)
        .map(|(_, rate)| *rate)
}

/// Cross rate through USD from the static table.
pub fn fallback_rate(from: &str, to: &str) -> Option<Decimal> {
    let from_usd = static_usd_rate(from)?;
    let to_usd = static_usd_rate(to)?;
    if to_usd.is_zero() {
        return None;
    }
    Some((from_usd / to_usd).round_dp(8))
}

#[derive(Debug, Deserialize)]
struct LatestRates {
    #[serde(default)]
    rates: HashMap<String, Decimal>,
}

/// Client for the live rate API.
#[derive(Debug, Clone)]
pub struct RateClient {
    base_url: String,
    client: reqwest::Client,
}

impl RateClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn live_rate(&self, from: &str, to: &str) -> Result<Decimal, UpstreamError> {
        let url = format!("{}/latest/{}", self.base_url, from);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }

        let body: LatestRates = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;

        body.rates
            .get(to)
            .copied()
            .ok_or_else(|| UpstreamError::UnsupportedCurrency(to.to_string()))
    }

    /// Quote `from → to`, converting `amount` when given.
    ///
    /// Falls back to [`STATIC_USD_RATES`] on any live failure; only a pair
    /// unknown to both sources is an error.
    pub async fn conversion_rate(
        &self,
        from: &str,
        to: &str,
        amount: Option<Decimal>,
    ) -> Result<ConversionRate, UpstreamError> {
        let from = from.trim().to_ascii_uppercase();
        let to = to.trim().to_ascii_uppercase();

        if from == to {
            return ConversionRate::new(&from, &to, Decimal::ONE, amount, SOURCE_LIVE);
        }

        match self.live_rate(&from, &to).await {
            Ok(rate) => {
                debug!(%from, %to, %rate, "Live conversion rate");
                ConversionRate::new(&from, &to, rate, amount, SOURCE_LIVE)
            }
            Err(e) => {
                warn!(%from, %to, error = %e, "Rate API failed, using fallback table");
                let rate = fallback_rate(&from, &to)
                    .ok_or_else(|| UpstreamError::UnsupportedCurrency(format!("{from}/{to}")))?;
                ConversionRate::new(&from, &to, rate, amount, SOURCE_FALLBACK)
            }
        }
    }

    /// USD value of one unit of `currency`.
    pub async fn usd_price(&self, currency: &str) -> Result<Decimal, UpstreamError> {
        Ok(self.conversion_rate(currency, "USD", None).await?.rate)
    }
}
