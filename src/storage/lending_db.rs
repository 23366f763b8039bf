// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded lending database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `pools`: pool_id → serialized LendingPool
//! - `contributions`: contribution_id → serialized Contribution
//! - `user_contributions`: composite key (user_id|contribution_id) → pool_id
//! - `profiles`: user_id → serialized UserProfile

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Deserialize;

use crate::lending::{Contribution, LendingPool, UserProfile};

// =============================================================================
// Table Definitions
// =============================================================================

const POOLS: TableDefinition<&str, &[u8]> = TableDefinition::new("pools");

const CONTRIBUTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("contributions");

/// Index: `user_id|contribution_id` → pool_id.
const USER_CONTRIBUTIONS: TableDefinition<&str, &str> = TableDefinition::new("user_contributions");

const PROFILES: TableDefinition<&str, &[u8]> = TableDefinition::new("profiles");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LendingDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("seed file error: {0}")]
    Io(#[from] std::io::Error),
}

pub type LendingDbResult<T> = Result<T, LendingDbError>;

fn index_key(user_id: &str, contribution_id: &str) -> String {
    format!("{user_id}|{contribution_id}")
}

/// Upper bound for a prefix scan over `user_id|…`. `}` sorts right after `|`.
fn index_prefix_range(user_id: &str) -> (String, String) {
    (format!("{user_id}|"), format!("{user_id}}}"))
}

/// Seed file layout, as exported from the hosted database.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub pools: Vec<LendingPool>,
    #[serde(default)]
    pub contributions: Vec<Contribution>,
    #[serde(default)]
    pub profiles: Vec<UserProfile>,
}

// =============================================================================
// LendingDatabase
// =============================================================================

/// Relational store behind the remote data functions.
pub struct LendingDatabase {
    db: Database,
}

impl LendingDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> LendingDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(POOLS)?;
            let _ = write_txn.open_table(CONTRIBUTIONS)?;
            let _ = write_txn.open_table(USER_CONTRIBUTIONS)?;
            let _ = write_txn.open_table(PROFILES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Pools
    // =========================================================================

    pub fn upsert_pool(&self, pool: &LendingPool) -> LendingDbResult<()> {
        let json = serde_json::to_vec(pool)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(POOLS)?;
            table.insert(pool.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_pool(&self, pool_id: &str) -> LendingDbResult<Option<LendingPool>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(POOLS)?;
        match table.get(pool_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All pools, newest first.
    pub fn list_pools(&self) -> LendingDbResult<Vec<LendingPool>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(POOLS)?;

        let mut pools = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let pool: LendingPool = serde_json::from_slice(value.value())?;
            pools.push(pool);
        }
        pools.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pools)
    }

    // =========================================================================
    // Contributions
    // =========================================================================

    /// Insert or update a contribution and its user index entry.
    pub fn upsert_contribution(&self, contribution: &Contribution) -> LendingDbResult<()> {
        let json = serde_json::to_vec(contribution)?;
        let key = index_key(&contribution.user_id, &contribution.id);

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CONTRIBUTIONS)?;

            // Drop a stale index entry if the owner changed
            let previous = match table.get(contribution.id.as_str())? {
                Some(value) => Some(serde_json::from_slice::<Contribution>(value.value())?),
                None => None,
            };

            table.insert(contribution.id.as_str(), json.as_slice())?;

            let mut idx = write_txn.open_table(USER_CONTRIBUTIONS)?;
            if let Some(prev) = previous {
                if prev.user_id != contribution.user_id {
                    idx.remove(index_key(&prev.user_id, &prev.id).as_str())?;
                }
            }
            idx.insert(key.as_str(), contribution.pool_id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Every contribution linked to a pool.
    pub fn contributions_for_pool(&self, pool_id: &str) -> LendingDbResult<Vec<Contribution>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CONTRIBUTIONS)?;

        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let c: Contribution = serde_json::from_slice(value.value())?;
            if c.pool_id == pool_id {
                out.push(c);
            }
        }
        Ok(out)
    }

    /// A user's contributions, newest first.
    pub fn contributions_for_user(&self, user_id: &str) -> LendingDbResult<Vec<Contribution>> {
        let read_txn = self.db.begin_read()?;
        let idx = read_txn.open_table(USER_CONTRIBUTIONS)?;
        let table = read_txn.open_table(CONTRIBUTIONS)?;

        let (start, end) = index_prefix_range(user_id);
        let mut out = Vec::new();
        for entry in idx.range(start.as_str()..end.as_str())? {
            let (key, _) = entry?;
            // User ids may themselves contain `|`
            let Some(contribution_id) = key.value().strip_prefix(start.as_str()) else {
                continue;
            };
            if let Some(value) = table.get(contribution_id)? {
                let c: Contribution = serde_json::from_slice(value.value())?;
                if c.user_id == user_id {
                    out.push(c);
                }
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    pub fn upsert_profile(&self, profile: &UserProfile) -> LendingDbResult<()> {
        let json = serde_json::to_vec(profile)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROFILES)?;
            table.insert(profile.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: &str) -> LendingDbResult<Option<UserProfile>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROFILES)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Load pools, contributions and profiles from a JSON seed file.
    ///
    /// Returns the number of rows written.
    pub fn seed_from_file(&self, path: &Path) -> LendingDbResult<usize> {
        let bytes = std::fs::read(path)?;
        let seed: SeedData = serde_json::from_slice(&bytes)?;
        self.seed(&seed)
    }

    pub fn seed(&self, seed: &SeedData) -> LendingDbResult<usize> {
        for pool in &seed.pools {
            self.upsert_pool(pool)?;
        }
        for contribution in &seed.contributions {
            self.upsert_contribution(contribution)?;
        }
        for profile in &seed.profiles {
            self.upsert_profile(profile)?;
        }
        Ok(seed.pools.len() + seed.contributions.len() + seed.profiles.len())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lending::PaymentStatus;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn temp_db() -> (LendingDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = LendingDatabase::open(&dir.path().join("lending.redb")).unwrap();
        (db, dir)
    }

    fn sample_pool(id: &str, age_days: i64) -> LendingPool {
        LendingPool {
            id: id.to_string(),
            name: format!("Pool {id}"),
            description: None,
            currency: "USDC".to_string(),
            target_amount: dec!(10000),
            monthly_interest: dec!(2),
            min_lend_period_days: 30,
            closing_date: Utc::now() - Duration::days(age_days),
            status: "active".to_string(),
            created_at: Utc::now() - Duration::days(age_days + 30),
        }
    }

    fn sample_contribution(id: &str, pool_id: &str, user_id: &str) -> Contribution {
        Contribution {
            id: id.to_string(),
            pool_id: pool_id.to_string(),
            user_id: user_id.to_string(),
            amount: dec!(100),
            payment_status: PaymentStatus::Confirmed,
            expected_claim_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_and_get_pool() {
        let (db, _dir) = temp_db();
        let pool = sample_pool("p-1", 10);
        db.upsert_pool(&pool).unwrap();

        assert_eq!(db.get_pool("p-1").unwrap(), Some(pool));
        assert_eq!(db.get_pool("missing").unwrap(), None);
    }

    #[test]
    fn list_pools_newest_first() {
        let (db, _dir) = temp_db();
        db.upsert_pool(&sample_pool("old", 100)).unwrap();
        db.upsert_pool(&sample_pool("new", 1)).unwrap();
        db.upsert_pool(&sample_pool("mid", 50)).unwrap();

        let ids: Vec<_> = db.list_pools().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn contributions_by_pool_and_user() {
        let (db, _dir) = temp_db();
        db.upsert_contribution(&sample_contribution("c-1", "p-1", "alice")).unwrap();
        db.upsert_contribution(&sample_contribution("c-2", "p-1", "bob")).unwrap();
        db.upsert_contribution(&sample_contribution("c-3", "p-2", "alice")).unwrap();

        assert_eq!(db.contributions_for_pool("p-1").unwrap().len(), 2);
        assert_eq!(db.contributions_for_pool("p-2").unwrap().len(), 1);

        let alice: Vec<_> = db
            .contributions_for_user("alice")
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(alice.len(), 2);
        assert!(alice.contains(&"c-1".to_string()));
        assert!(alice.contains(&"c-3".to_string()));
    }

    #[test]
    fn user_prefix_does_not_leak_into_similar_ids() {
        let (db, _dir) = temp_db();
        db.upsert_contribution(&sample_contribution("c-1", "p-1", "al")).unwrap();
        db.upsert_contribution(&sample_contribution("c-2", "p-1", "alice")).unwrap();

        let al = db.contributions_for_user("al").unwrap();
        assert_eq!(al.len(), 1);
        assert_eq!(al[0].id, "c-1");
    }

    #[test]
    fn user_ids_containing_separator() {
        let (db, _dir) = temp_db();
        db.upsert_contribution(&sample_contribution("c-1", "p-1", "org|alice")).unwrap();
        db.upsert_contribution(&sample_contribution("alice|c-2", "p-1", "org")).unwrap();

        let scoped = db.contributions_for_user("org|alice").unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "c-1");

        let org = db.contributions_for_user("org").unwrap();
        assert_eq!(org.len(), 1);
        assert_eq!(org[0].id, "alice|c-2");
    }

    #[test]
    fn reassigned_contribution_moves_index() {
        let (db, _dir) = temp_db();
        db.upsert_contribution(&sample_contribution("c-1", "p-1", "alice")).unwrap();
        db.upsert_contribution(&sample_contribution("c-1", "p-1", "bob")).unwrap();

        assert!(db.contributions_for_user("alice").unwrap().is_empty());
        assert_eq!(db.contributions_for_user("bob").unwrap().len(), 1);
    }

    #[test]
    fn seed_from_file_loads_all_tables() {
        let (db, dir) = temp_db();
        let seed_path = dir.path().join("seed.json");
        std::fs::write(
            &seed_path,
            r#"{
                "pools": [{
                    "id": "p-1", "name": "Harvest", "target_amount": "5000",
                    "monthly_interest": "1.5", "min_lend_period_days": 60,
                    "closing_date": "2026-01-01T00:00:00Z",
                    "created_at": "2025-12-01T00:00:00Z"
                }],
                "contributions": [{
                    "id": "c-1", "pool_id": "p-1", "user_id": "u-1",
                    "amount": 250, "payment_status": "confirmed",
                    "created_at": "2025-12-15T00:00:00Z"
                }],
                "profiles": [{
                    "id": "u-1", "wallet_address": "0xabc",
                    "created_at": "2025-11-01T00:00:00Z"
                }]
            }"#,
        )
        .unwrap();

        let rows = db.seed_from_file(&seed_path).unwrap();
        assert_eq!(rows, 3);

        let pool = db.get_pool("p-1").unwrap().unwrap();
        assert_eq!(pool.currency, "USDC");
        assert_eq!(pool.monthly_interest, dec!(1.5));
        assert_eq!(db.contributions_for_user("u-1").unwrap().len(), 1);
        assert_eq!(
            db.get_profile("u-1").unwrap().unwrap().wallet_address.as_deref(),
            Some("0xabc")
        );
    }
}
