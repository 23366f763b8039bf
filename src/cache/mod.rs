// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Time-windowed entity cache over durable client storage.
//!
//! One [`EntityCache`] per entity kind, each owning a single storage slot
//! holding `{data, timestamp, version}`. Reads of stale or foreign-version
//! snapshots purge the slot and report a miss. Caching is best-effort: every
//! storage failure degrades to a miss (on read) or a log line (on write).

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::lending::{self, DerivedFields, PortfolioEntry};
use crate::storage::KeyValueStore;

/// Snapshots older than this are treated as absent.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Format tag written with every snapshot. Bump on any change to the
/// serialized shape of a cached entity.
pub const CACHE_VERSION: &str = "1.0.0";

/// Cached entity kinds, one storage slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Portfolio,
    Profile,
}

impl EntityKind {
    pub fn storage_key(&self) -> &'static str {
        match self {
            EntityKind::Portfolio => "portfolio_cache",
            EntityKind::Profile => "profile_cache",
        }
    }
}

/// Stored snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry<T> {
    pub data: Vec<T>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub version: String,
}

/// Cache for one entity kind.
pub struct EntityCache<T> {
    kind: EntityKind,
    store: Arc<dyn KeyValueStore>,
    freshness: Duration,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityCache<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            store: Arc::clone(&self.store),
            freshness: self.freshness,
            _entity: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> EntityCache<T> {
    pub fn new(kind: EntityKind, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kind,
            store,
            freshness: FRESHNESS_WINDOW,
            _entity: PhantomData,
        }
    }

    /// Override the freshness window.
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The cached snapshot, if present, fresh and of the current version.
    ///
    /// Anything else (stale, foreign version, corrupt, unreadable) purges
    /// the slot and returns `None`.
    pub fn get(&self) -> Option<Vec<T>> {
        let entry = self.read_entry()?;

        if entry.version != CACHE_VERSION {
            debug!(
                kind = ?self.kind,
                version = %entry.version,
                "Cache version mismatch, purging"
            );
            self.clear();
            return None;
        }

        let age_ms = Utc::now().timestamp_millis() - entry.timestamp;
        if age_ms > self.freshness.as_millis() as i64 {
            debug!(kind = ?self.kind, age_ms, "Cache entry expired, purging");
            self.clear();
            return None;
        }

        Some(entry.data)
    }

    /// Store `data` stamped with the current time and version.
    pub fn set(&self, data: &[T]) {
        self.write_at(data, Utc::now().timestamp_millis());
    }

    fn write_at(&self, data: &[T], timestamp: i64) {
        let entry = CacheEntryRef {
            data,
            timestamp,
            version: CACHE_VERSION,
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(kind = ?self.kind, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(self.kind.storage_key(), &raw) {
            warn!(kind = ?self.kind, error = %e, "Failed to write cache entry");
        }
    }

    /// Unconditionally purge the slot.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(self.kind.storage_key()) {
            warn!(kind = ?self.kind, error = %e, "Failed to purge cache entry");
        }
    }

    /// When the snapshot was written, formatted for display.
    pub fn get_last_updated(&self) -> Option<String> {
        let raw = self.store.get(self.kind.storage_key()).ok()??;
        let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
        let millis = value.get("timestamp")?.as_i64()?;
        let at = DateTime::<Utc>::from_timestamp_millis(millis)?;
        Some(at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
    }

    fn read_entry(&self) -> Option<CacheEntry<T>> {
        let raw = match self.store.get(self.kind.storage_key()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(kind = ?self.kind, error = %e, "Cache read failed, purging");
                self.clear();
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(kind = ?self.kind, error = %e, "Corrupt cache entry, purging");
                self.clear();
                None
            }
        }
    }
}

impl EntityCache<PortfolioEntry> {
    /// Derived fields for one entry. Pure; same formula as the server.
    pub fn calculate_derived_fields(entry: &PortfolioEntry, now: DateTime<Utc>) -> DerivedFields {
        lending::calculate_derived_fields(entry, now)
    }
}

/// Borrowed form of [`CacheEntry`] for writing without cloning the data.
#[derive(Serialize)]
struct CacheEntryRef<'a, T> {
    data: &'a [T],
    timestamp: i64,
    version: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DurableStore, SessionStore, StorageError, StorageResult};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Item {
        id: String,
        amount: rust_decimal::Decimal,
    }

    fn items() -> Vec<Item> {
        vec![
            Item {
                id: "a".to_string(),
                amount: rust_decimal_macros::dec!(10.50),
            },
            Item {
                id: "b".to_string(),
                amount: rust_decimal_macros::dec!(0.000001),
            },
        ]
    }

    fn durable() -> (Arc<DurableStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::open(&dir.path().join("client.redb")).unwrap();
        (Arc::new(store), dir)
    }

    /// Storage that fails every call.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Poisoned)
        }
        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Poisoned)
        }
        fn remove(&self, _key: &str) -> StorageResult<()> {
            Err(StorageError::Poisoned)
        }
        fn clear(&self) -> StorageResult<()> {
            Err(StorageError::Poisoned)
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let (store, _dir) = durable();
        let cache = EntityCache::<Item>::new(EntityKind::Portfolio, store);
        let data = items();

        assert!(cache.get().is_none());
        cache.set(&data);

        let cached = cache.get().unwrap();
        assert_eq!(cached, data);
        assert_eq!(
            serde_json::to_string(&cached).unwrap(),
            serde_json::to_string(&data).unwrap()
        );
    }

    #[test]
    fn expired_entry_is_purged() {
        let store = Arc::new(SessionStore::new());
        let cache = EntityCache::<Item>::new(EntityKind::Portfolio, store.clone());

        let six_minutes_ago = Utc::now().timestamp_millis() - 6 * 60 * 1000;
        cache.write_at(&items(), six_minutes_ago);
        assert!(store.get("portfolio_cache").unwrap().is_some());

        assert!(cache.get().is_none());
        assert!(store.get("portfolio_cache").unwrap().is_none());
    }

    #[test]
    fn version_mismatch_is_purged_regardless_of_age() {
        let store = Arc::new(SessionStore::new());
        let raw = serde_json::json!({
            "data": [{"id": "a", "amount": "1"}],
            "timestamp": Utc::now().timestamp_millis(),
            "version": "0.9.0",
        });
        store.set("profile_cache", &raw.to_string()).unwrap();

        let cache = EntityCache::<Item>::new(EntityKind::Profile, store.clone());
        assert!(cache.get().is_none());
        assert!(store.get("profile_cache").unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let store = Arc::new(SessionStore::new());
        store.set("portfolio_cache", "{not json").unwrap();

        let cache = EntityCache::<Item>::new(EntityKind::Portfolio, store.clone());
        assert!(cache.get().is_none());
        assert!(store.get("portfolio_cache").unwrap().is_none());
    }

    #[test]
    fn broken_storage_never_panics() {
        let cache = EntityCache::<Item>::new(EntityKind::Portfolio, Arc::new(BrokenStore));
        cache.set(&items());
        assert!(cache.get().is_none());
        assert!(cache.get_last_updated().is_none());
        cache.clear();
    }

    #[test]
    fn clear_removes_slot() {
        let store = Arc::new(SessionStore::new());
        let cache = EntityCache::<Item>::new(EntityKind::Portfolio, store.clone());
        cache.set(&items());
        cache.clear();
        assert!(store.get("portfolio_cache").unwrap().is_none());
    }

    #[test]
    fn kinds_use_separate_slots() {
        let store: Arc<SessionStore> = Arc::new(SessionStore::new());
        let portfolio = EntityCache::<Item>::new(EntityKind::Portfolio, store.clone());
        let profile = EntityCache::<Item>::new(EntityKind::Profile, store.clone());

        portfolio.set(&items());
        assert!(profile.get().is_none());
        assert_eq!(portfolio.get().unwrap().len(), 2);
    }

    #[test]
    fn last_updated_formats_timestamp() {
        let store = Arc::new(SessionStore::new());
        let cache = EntityCache::<Item>::new(EntityKind::Portfolio, store.clone());
        assert!(cache.get_last_updated().is_none());

        // 2026-01-02T03:04:05Z
        cache.write_at(&items(), 1_767_323_045_000);
        assert_eq!(
            cache.get_last_updated().as_deref(),
            Some("2026-01-02 03:04:05 UTC")
        );

        store.set("portfolio_cache", r#"{"timestamp":"soon"}"#).unwrap();
        assert!(cache.get_last_updated().is_none());
    }

    #[test]
    fn custom_freshness_window() {
        let store = Arc::new(SessionStore::new());
        let cache = EntityCache::<Item>::new(EntityKind::Portfolio, store)
            .with_freshness(Duration::from_secs(60));

        cache.write_at(&items(), Utc::now().timestamp_millis() - 2 * 60 * 1000);
        assert!(cache.get().is_none());
    }
}
