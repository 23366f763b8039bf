// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the remote data functions. All types derive `Serialize` or `Deserialize`
//! and `ToSchema` for JSON handling and OpenAPI documentation.
//!
//! Request bodies are camelCase. Pool, contribution and profile rows keep
//! the store's snake_case.
//!
//! ## Wallet Address Type
//!
//! The [`WalletAddress`] newtype wraps Ethereum-style addresses (0x-prefixed,
//! 40 hex characters). It provides type safety and clear semantics.
//!
//! ## Model Categories
//!
//! - **Pools**: Pool listing and pool detail with funding totals
//! - **Portfolio**: Per-user portfolio and profile lookups
//! - **Balances**: ERC-20 and USDC balances from the chain-data API
//! - **Rates**: Currency conversion

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::lending::{LendingPool, PortfolioEntry, UserProfile};
use crate::upstream::{Chain, TokenBalance};

// =============================================================================
// Wallet Address Type
// =============================================================================

/// Ethereum-compatible wallet address wrapper.
///
/// Format: `0x` followed by 40 hexadecimal characters (20 bytes).
///
/// # Example
///
/// ```rust,ignore
/// let addr = WalletAddress::from("0x742d35Cc6634C0532925a3b844Bc9e7595f4aB12");
/// assert!(addr.is_valid());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0
            .strip_prefix("0x")
            .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
            .unwrap_or(false)
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WalletAddress {
    fn from(value: String) -> Self {
        WalletAddress(value)
    }
}

impl From<&str> for WalletAddress {
    fn from(value: &str) -> Self {
        WalletAddress(value.to_string())
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

// =============================================================================
// Pool Models
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LendingPoolsResponse {
    pub pools: Vec<LendingPool>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct PoolDetailRequest {
    /// Pool ID.
    pub id: Option<String>,
}

/// A pool with its funding totals.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PoolDetail {
    #[serde(flatten)]
    pub pool: LendingPool,
    /// Sum of all contributions into the pool.
    pub total_lent: Decimal,
    /// `total_lent / target_amount` in percent, clamped to 0–100.
    pub funding_progress: Decimal,
    pub contribution_count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PoolDetailResponse {
    pub pool: PoolDetail,
}

// =============================================================================
// Portfolio and Profile Models
// =============================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PortfolioResponse {
    pub portfolio: Vec<PortfolioEntry>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    pub profile: UserProfile,
}

// =============================================================================
// Balance Models
// =============================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceRequest {
    pub wallet_address: Option<String>,
    /// One of `eth`, `base`, `polygon`, `arbitrum`.
    pub chain: Option<String>,
}

/// A token holding with its USD valuation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricedToken {
    #[serde(flatten)]
    pub token: TokenBalance,
    /// `None` when no rate is known for the symbol.
    pub usd_value: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceResponse {
    pub wallet_address: WalletAddress,
    pub chain: Chain,
    pub tokens: Vec<PricedToken>,
    pub total_usd: Decimal,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsdcBalanceRequest {
    pub wallet_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ChainBalance {
    pub chain: Chain,
    pub balance: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsdcBalanceResponse {
    pub wallet_address: WalletAddress,
    pub balances: Vec<ChainBalance>,
    pub total: Decimal,
    /// Chains whose lookup failed and are missing from `balances`.
    pub unavailable: Vec<Chain>,
}

// =============================================================================
// Rate Models
// =============================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRateRequest {
    pub from_currency: Option<String>,
    pub to_currency: Option<String>,
    pub amount: Option<Decimal>,
}
