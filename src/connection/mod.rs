// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Connection
//!
//! Tracks the embedded-wallet provider's readiness and the health of its
//! wallet sub-channel, and recovers from transport failures with a bounded,
//! escalating retry policy.
//!
//! - `state` - the published [`ConnectionState`] and its patch type
//! - `provider` - provider snapshots and wallet address resolution
//! - `events` - runtime error events and failure recognition
//! - `probe` - wallet liveness probe and reload seams
//! - `controller` - the state machine and retry staging
//! - `signals` - debounced provider signal feed

pub mod controller;
pub mod events;
pub mod probe;
pub mod provider;
pub mod signals;
pub mod state;

pub use controller::{
    ConnectionConfig, ConnectionController, ConnectionDeps, RetryOutcome, MAX_RETRIES_MESSAGE,
};
pub use events::{is_wallet_transport_error, RuntimeEvent};
pub use probe::{ProbeError, Reloader, RpcWalletProbe, WalletProbe};
pub use provider::{
    resolve_wallet_address, EmbeddedWallet, LinkedWallet, ProviderSignals, ProviderSnapshot,
    ProviderUser,
};
pub use signals::{spawn_signal_feed, SIGNAL_DEBOUNCE};
pub use state::{ConnectionPatch, ConnectionQuality, ConnectionState};
