// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Two independent stores live here:
//!
//! - **Client storage** ([`client_store`]): the wallet client's durable and
//!   session key/value scopes. The connection controller purges provider
//!   keys from it; the entity caches keep their snapshots in it.
//! - **Lending database** ([`lending_db`]): the relational data behind the
//!   remote data functions (pools, contributions, profiles).
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   client.redb     # durable client key/value store
//!   lending.redb    # pools, contributions, profiles
//! ```

pub mod client_store;
pub mod lending_db;
pub mod paths;

pub use client_store::{
    DurableStore, KeyValueStore, SessionStore, StorageError, StorageResult, PRIVY_CONNECTIONS_KEY,
    PRIVY_WALLET_KEY,
};
pub use lending_db::{LendingDatabase, LendingDbError, LendingDbResult, SeedData};
pub use paths::StoragePaths;
