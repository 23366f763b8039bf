// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Data Access
//!
//! Loads the signed-in user's portfolio and profile through the remote data
//! functions, with the [`EntityCache`](crate::cache::EntityCache) in front.
//!
//! A load only runs while the session is `authenticated && ready`, at most
//! one load per entity kind is in flight, and results that arrive after
//! shutdown or logout are dropped.

pub mod remote;
pub mod service;

pub use remote::{FunctionsClient, RemoteDataSource, RemoteError, GET_PORTFOLIO, GET_PROFILE};
pub use service::{
    EntityService, EntitySource, LoadOutcome, PortfolioService, PortfolioSource, ProfileService,
    ProfileSource, SessionView,
};
