// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Observable shape of the embedded-wallet provider.
//!
//! The provider itself is an external collaborator. The controller only ever
//! sees snapshots of it: the `ready` and `authenticated` flags, the logged-in
//! user's embedded wallet, and the list of linked wallets.

use serde::{Deserialize, Serialize};

use crate::models::WalletAddress;

/// The two lifecycle flags the controller reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderSignals {
    pub ready: bool,
    pub authenticated: bool,
}

impl ProviderSignals {
    pub fn new(ready: bool, authenticated: bool) -> Self {
        Self {
            ready,
            authenticated,
        }
    }

    /// Both flags are set; dependent data may be requested.
    pub fn is_session_live(&self) -> bool {
        self.ready && self.authenticated
    }
}

/// A wallet linked to the session (embedded or external).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedWallet {
    pub address: String,
    pub wallet_client_type: String,
    #[serde(default)]
    pub imported: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddedWallet {
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub wallet: Option<EmbeddedWallet>,
}

/// Point-in-time view of the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSnapshot {
    pub ready: bool,
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<ProviderUser>,
    #[serde(default)]
    pub wallets: Vec<LinkedWallet>,
}

impl ProviderSnapshot {
    pub fn signals(&self) -> ProviderSignals {
        ProviderSignals::new(self.ready, self.authenticated)
    }

    pub fn wallet_address(&self) -> Option<WalletAddress> {
        resolve_wallet_address(&self.wallets, self.user.as_ref())
    }
}

/// Resolve the address to display for the session.
///
/// The first linked wallet wins; the user's embedded wallet is the fallback.
/// Blank addresses count as absent.
pub fn resolve_wallet_address(
    wallets: &[LinkedWallet],
    user: Option<&ProviderUser>,
) -> Option<WalletAddress> {
    let from_wallets = wallets
        .first()
        .map(|w| w.address.trim())
        .filter(|a| !a.is_empty());

    let from_user = || {
        user.and_then(|u| u.wallet.as_ref())
            .and_then(|w| w.address.as_deref())
            .map(str::trim)
            .filter(|a| !a.is_empty())
    };

    from_wallets.or_else(from_user).map(WalletAddress::from)
}
