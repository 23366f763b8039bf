// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 balances from the third-party chain-data API.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use utoipa::ToSchema;

use super::UpstreamError;

/// Default chain-data API root.
pub const DEFAULT_CHAIN_DATA_API_URL: &str = "https://deep-index.moralis.io/api/v2.2";

/// EVM chains with a known USDC deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Eth,
    Base,
    Polygon,
    Arbitrum,
}

impl Chain {
    pub const ALL: [Chain; 4] = [Chain::Eth, Chain::Base, Chain::Polygon, Chain::Arbitrum];

    /// Accepts the identifier plus a few common aliases, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eth" | "ethereum" | "mainnet" => Some(Chain::Eth),
            "base" => Some(Chain::Base),
            "polygon" | "matic" => Some(Chain::Polygon),
            "arbitrum" | "arb" => Some(Chain::Arbitrum),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Eth => "eth",
            Chain::Base => "base",
            Chain::Polygon => "polygon",
            Chain::Arbitrum => "arbitrum",
        }
    }

    /// Native USDC contract on this chain.
    pub fn usdc_contract(&self) -> &'static str {
        match self {
            Chain::Eth => "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            Chain::Base => "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
            Chain::Polygon => "0x3c499c542cef5e3811e1192ce70d8cc03d5c3359",
            Chain::Arbitrum => "0xaf88d065e77c8cc2239327c5edb3a432268e5831",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ERC-20 holding.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TokenBalance {
    /// Token contract address (lowercase)
    pub contract_address: String,
    /// Token symbol (e.g., "USDC")
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Balance in base units, as reported upstream
    pub raw_balance: String,
    /// Balance scaled by `decimals`
    pub balance: Decimal,
}

/// Row shape returned by the chain-data API.
#[derive(Debug, Deserialize)]
struct UpstreamToken {
    token_address: String,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    decimals: Option<u8>,
    balance: String,
}

impl UpstreamToken {
    fn into_balance(self) -> Result<TokenBalance, UpstreamError> {
        let decimals = self.decimals.unwrap_or(18);
        let balance = format_units(&self.balance, decimals)?;
        Ok(TokenBalance {
            contract_address: self.token_address.to_ascii_lowercase(),
            symbol: self.symbol.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            decimals,
            raw_balance: self.balance,
            balance,
        })
    }
}

/// Scale an integer base-unit amount by `decimals`.
pub fn format_units(raw: &str, decimals: u8) -> Result<Decimal, UpstreamError> {
    let units: i128 = raw
        .trim()
        .parse()
        .map_err(|_| UpstreamError::InvalidResponse(format!("invalid balance: {raw}")))?;
    Decimal::try_from_i128_with_scale(units, u32::from(decimals))
        .map(|d| d.normalize())
        .map_err(|_| UpstreamError::InvalidResponse(format!("balance out of range: {raw}")))
}

/// Client for the chain-data API.
#[derive(Debug, Clone)]
pub struct ChainDataClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChainDataClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn erc20_url(&self, wallet_address: &str, chain: Chain) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&format!("{}/{}/erc20", self.base_url, wallet_address))
            .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair("chain", chain.as_str());
        Ok(url)
    }

    /// Every ERC-20 balance `wallet_address` holds on `chain`.
    pub async fn token_balances(
        &self,
        wallet_address: &str,
        chain: Chain,
    ) -> Result<Vec<TokenBalance>, UpstreamError> {
        let url = self.erc20_url(wallet_address, chain)?;
        debug!(%chain, wallet = wallet_address, "Querying token balances");

        let mut request = self.client.get(url).header("accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status(response.status().as_u16()));
        }

        let rows: Vec<UpstreamToken> = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;

        rows.into_iter().map(UpstreamToken::into_balance).collect()
    }

    /// USDC balance on `chain`; zero when the wallet holds none.
    pub async fn usdc_balance(
        &self,
        wallet_address: &str,
        chain: Chain,
    ) -> Result<Decimal, UpstreamError> {
        let tokens = self.token_balances(wallet_address, chain).await?;
        Ok(usdc_from(&tokens, chain))
    }
}

fn usdc_from(tokens: &[TokenBalance], chain: Chain) -> Decimal {
    tokens
        .iter()
        .filter(|t| t.contract_address == chain.usdc_contract())
        .map(|t| t.balance)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_chain_aliases() {
        assert_eq!(Chain::parse("ETH"), Some(Chain::Eth));
        assert_eq!(Chain::parse("ethereum"), Some(Chain::Eth));
        assert_eq!(Chain::parse(" matic "), Some(Chain::Polygon));
        assert_eq!(Chain::parse("arb"), Some(Chain::Arbitrum));
        assert_eq!(Chain::parse("solana"), None);
    }

    #[test]
    fn format_units_scales() {
        assert_eq!(format_units("1000000", 6).unwrap(), dec!(1));
        assert_eq!(format_units("1500000", 6).unwrap(), dec!(1.5));
        assert_eq!(format_units("1234567890000000000", 18).unwrap(), dec!(1.23456789));
        assert_eq!(format_units("0", 18).unwrap(), Decimal::ZERO);
        assert!(format_units("abc", 6).is_err());
    }

    #[test]
    fn upstream_rows_decode() {
        let raw = r#"[
            {"token_address":"0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48","symbol":"USDC",
             "name":"USD Coin","decimals":6,"balance":"2500000","possible_spam":false},
            {"token_address":"0xdead","balance":"1"}
        ]"#;
        let rows: Vec<UpstreamToken> = serde_json::from_str(raw).unwrap();
        let balances: Vec<TokenBalance> = rows
            .into_iter()
            .map(|r| r.into_balance().unwrap())
            .collect();

        assert_eq!(balances[0].balance, dec!(2.5));
        assert_eq!(balances[0].contract_address, Chain::Eth.usdc_contract());
        assert_eq!(balances[1].decimals, 18);
        assert_eq!(usdc_from(&balances, Chain::Eth), dec!(2.5));
        assert_eq!(usdc_from(&balances, Chain::Base), Decimal::ZERO);
    }

    #[test]
    fn erc20_url_shape() {
        let client = ChainDataClient::new("https://chain.example/api/", None).unwrap();
        let url = client.erc20_url("0xabc", Chain::Polygon).unwrap();
        assert_eq!(url.as_str(), "https://chain.example/api/0xabc/erc20?chain=polygon");
    }
}
