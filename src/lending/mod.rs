// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Lending Domain Model
//!
//! Pools, contributions and portfolio entries shared by the client cache and
//! the remote data functions, plus the derived-field calculator that both
//! sides apply.
//!
//! Wire format is snake_case to match the rows stored in the relational
//! store. Amounts are [`Decimal`] and serialize as strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod derived;

pub use derived::{calculate_derived_fields, funding_progress, DerivedFields};

/// Payment state of a contribution.
///
/// `Completed` means the claim has been paid out; such entries are never
/// eligible again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Failed,
}

/// A lending pool users contribute to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct LendingPool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub target_amount: Decimal,
    /// Simple interest per 30-day month, in percent.
    pub monthly_interest: Decimal,
    pub min_lend_period_days: i64,
    pub closing_date: DateTime<Utc>,
    #[serde(default = "default_pool_status")]
    pub status: String,
    pub created_at: DateTime<Utc>,
}

fn default_currency() -> String {
    "USDC".to_string()
}

fn default_pool_status() -> String {
    "active".to_string()
}

impl LendingPool {
    pub fn terms(&self) -> PoolTerms {
        PoolTerms {
            pool_id: self.id.clone(),
            name: self.name.clone(),
            closing_date: self.closing_date,
            min_lend_period_days: self.min_lend_period_days,
            monthly_interest: self.monthly_interest,
        }
    }
}

/// The slice of a pool the derived-field calculator needs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PoolTerms {
    pub pool_id: String,
    pub name: String,
    pub closing_date: DateTime<Utc>,
    pub min_lend_period_days: i64,
    pub monthly_interest: Decimal,
}

/// A single user contribution into a pool.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Contribution {
    pub id: String,
    pub pool_id: String,
    pub user_id: String,
    pub amount: Decimal,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    /// Precomputed eligibility threshold. Takes precedence over
    /// `closing_date + min_lend_period_days` when present.
    #[serde(default)]
    pub expected_claim_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A contribution joined with its pool terms, as returned by `get-portfolio`
/// and held in the portfolio cache.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PortfolioEntry {
    #[serde(flatten)]
    pub contribution: Contribution,
    /// `None` when the linked pool no longer exists.
    #[serde(default)]
    pub pool: Option<PoolTerms>,
    #[serde(default)]
    pub is_eligible: bool,
    #[serde(default)]
    pub claimable_amount: Decimal,
    #[serde(default)]
    pub eligible_date: Option<DateTime<Utc>>,
}

impl PortfolioEntry {
    /// Join a contribution with its pool, without derived fields.
    pub fn new(contribution: Contribution, pool: Option<PoolTerms>) -> Self {
        Self {
            contribution,
            pool,
            is_eligible: false,
            claimable_amount: Decimal::ZERO,
            eligible_date: None,
        }
    }

    /// Return a copy with derived fields recomputed for `now`.
    pub fn with_derived(mut self, now: DateTime<Utc>) -> Self {
        let derived = calculate_derived_fields(&self, now);
        self.is_eligible = derived.is_eligible;
        self.claimable_amount = derived.claimable_amount;
        self.eligible_date = derived.eligible_date;
        self
    }
}

/// A user profile row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}
