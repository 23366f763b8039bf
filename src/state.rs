// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::path::PathBuf;
use std::sync::Arc;

use crate::storage::LendingDatabase;
use crate::upstream::{ChainDataClient, RateClient};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<LendingDatabase>,
    pub chain_data: ChainDataClient,
    pub rates: RateClient,
    /// Reported by the readiness check
    pub data_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(db: LendingDatabase, chain_data: ChainDataClient, rates: RateClient) -> Self {
        Self {
            db: Arc::new(db),
            chain_data,
            rates,
            data_dir: None,
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }
}
