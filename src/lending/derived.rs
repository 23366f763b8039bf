// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Derived portfolio fields: claim eligibility and claimable amount.
//!
//! ```text
//! threshold          = expected_claim_date ?? closing_date + min_lend_period_days
//! is_eligible        = now >= threshold && payment_status != completed
//! elapsed_days       = floor((now - closing_date) / 1 day)
//! elapsed_months     = elapsed_days / 30            (fractional)
//! claimable_amount   = amount * (1 + elapsed_months * monthly_interest / 100)
//! ```
//!
//! `claimable_amount` is zero whenever the entry is not eligible. The same
//! function runs in the client cache path and in the `get-portfolio`
//! handler, so both always agree.

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{PaymentStatus, PortfolioEntry};

const DAYS_PER_MONTH: Decimal = dec!(30);
const PERCENT: Decimal = dec!(100);

/// Computed fields, never stored as the source of truth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DerivedFields {
    pub is_eligible: bool,
    pub claimable_amount: Decimal,
    /// The eligibility threshold, when the entry has pool terms.
    pub eligible_date: Option<DateTime<Utc>>,
}

impl DerivedFields {
    fn ineligible(eligible_date: Option<DateTime<Utc>>) -> Self {
        Self {
            is_eligible: false,
            claimable_amount: Decimal::ZERO,
            eligible_date,
        }
    }
}

/// Compute eligibility and claimable amount for `entry` at `now`.
///
/// Entries without linked pool terms are ineligible with a zero amount.
pub fn calculate_derived_fields(entry: &PortfolioEntry, now: DateTime<Utc>) -> DerivedFields {
    let Some(terms) = entry.pool.as_ref() else {
        return DerivedFields::ineligible(None);
    };

    let threshold = match entry.contribution.expected_claim_date {
        Some(date) => Some(date),
        None => TimeDelta::try_days(terms.min_lend_period_days)
            .and_then(|period| terms.closing_date.checked_add_signed(period)),
    };

    // An unrepresentable threshold is never reached
    let Some(threshold) = threshold else {
        return DerivedFields::ineligible(None);
    };

    let is_eligible =
        now >= threshold && entry.contribution.payment_status != PaymentStatus::Completed;
    if !is_eligible {
        return DerivedFields::ineligible(Some(threshold));
    }

    let elapsed_days = (now - terms.closing_date).num_days().max(0);
    let Some(claimable_amount) = claimable_amount(
        entry.contribution.amount,
        elapsed_days,
        terms.monthly_interest,
    ) else {
        warn!(
            contribution_id = %entry.contribution.id,
            amount = %entry.contribution.amount,
            "Claimable amount out of range, treating as ineligible"
        );
        return DerivedFields::ineligible(Some(threshold));
    };

    DerivedFields {
        is_eligible: true,
        claimable_amount,
        eligible_date: Some(threshold),
    }
}

fn claimable_amount(
    amount: Decimal,
    elapsed_days: i64,
    monthly_interest: Decimal,
) -> Option<Decimal> {
    let elapsed_months = Decimal::from(elapsed_days).checked_div(DAYS_PER_MONTH)?;
    let growth = elapsed_months.checked_mul(monthly_interest.checked_div(PERCENT)?)?;
    amount.checked_mul(Decimal::ONE.checked_add(growth)?)
}

/// Percentage of `target` already lent, clamped to `[0, 100]`.
pub fn funding_progress(total_lent: Decimal, target: Decimal) -> Decimal {
    if target <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    // Overflow means the ratio is far outside the clamp range
    let ratio = total_lent
        .checked_div(target)
        .and_then(|r| r.checked_mul(PERCENT))
        .unwrap_or(if total_lent.is_sign_negative() {
            Decimal::ZERO
        } else {
            PERCENT
        });
    ratio.clamp(Decimal::ZERO, PERCENT).round_dp(2)
}
