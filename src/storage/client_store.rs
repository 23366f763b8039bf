// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client-side key/value storage.
//!
//! Two scopes mirror what the wallet client has available:
//!
//! - [`DurableStore`]: survives restarts (redb file). Holds the provider's
//!   persisted connection keys and the entity cache snapshots.
//! - [`SessionStore`]: process-lifetime map. Cleared wholesale on escalated
//!   reconnects.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

/// Persisted provider connection list.
pub const PRIVY_CONNECTIONS_KEY: &str = "privy:connections";

/// Persisted provider wallet handle.
pub const PRIVY_WALLET_KEY: &str = "privy:wallet";

/// Single table: key → serialized value (UTF-8 text).
const CLIENT_STORAGE: TableDefinition<&str, &str> = TableDefinition::new("client_storage");

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
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

    #[error("storage lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// String key/value storage shared between the connection controller and
/// the entity caches.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Remove every key in this scope.
    fn clear(&self) -> StorageResult<()>;
}

// =============================================================================
// DurableStore
// =============================================================================

/// redb-backed durable storage.
pub struct DurableStore {
    db: Database,
}

impl DurableStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so read transactions on a fresh file succeed
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CLIENT_STORAGE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl KeyValueStore for DurableStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLIENT_STORAGE)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CLIENT_STORAGE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CLIENT_STORAGE)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        // Drop and recreate the table
        write_txn.delete_table(CLIENT_STORAGE)?;
        {
            let _ = write_txn.open_table(CLIENT_STORAGE)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// SessionStore
// =============================================================================

/// In-memory session-scoped storage.
#[derive(Default)]
pub struct SessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for SessionStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.clear();
        Ok(())
    }
}
