// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Lending - Wallet Client Core and Remote Data Functions
//!
//! Client side: wallet connection tracking with staged recovery, a
//! time-windowed entity cache, and cached portfolio/profile loading.
//! Server side: the remote data functions over a relational lending store,
//! plus proxies for chain-data and rate APIs.
//!
//! ## Modules
//!
//! - `connection` - Wallet connection state machine and retry policy
//! - `cache` - Versioned, time-windowed entity snapshots
//! - `client` - Remote data access behind the cache
//! - `lending` - Pools, contributions and the derived-field calculator
//! - `storage` - Client key/value storage and the lending store (redb)
//! - `upstream` - Chain-data and conversion rate APIs
//! - `api` - HTTP API handlers (Axum)

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod lending;
pub mod models;
pub mod state;
pub mod storage;
pub mod upstream;
