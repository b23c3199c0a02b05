//! Transaction state
//!
//! A transaction tracks three associative structures, all keyed by the
//! flattened `table_key` (`table_name || 0x00 || key`):
//!
//! - **read set**: what the transaction observed, as [`ReadRecord`]
//!   snapshots. Under 2PL the record doubles as the list of held locks;
//!   under OCC its `meta` field is the version to validate at commit.
//! - **write set**: values staged for installation at commit.
//! - **delete set**: keys staged for removal at commit.
//!
//! The write and delete sets stay disjoint by construction: staging a write
//! clears any staged delete for the same key and vice versa.
//!
//! # Read-Your-Writes
//!
//! Reads inside a transaction resolve in a fixed order: write set, then
//! delete set (a staged delete reads as missing), then read set, then
//! storage. [`Transaction::resolve_local`] implements the first three
//! steps; the concurrency strategy supplies the storage step.

use rustc_hash::{FxHashMap, FxHashSet};
use trellis_core::{Error, Result, TxId, Value};

/// Snapshot of one key taken at first read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    /// Value at read time; `None` means the key was missing
    ///
    /// Under 2PL a `None` record marks a phantom guard: a placeholder entry
    /// was inserted into storage and must be removed when the transaction
    /// ends, unless a later write materializes the key.
    pub value: Option<Value>,
    /// Metadata at read time: version under OCC (0 when missing), the
    /// pre-acquisition lock word under 2PL
    pub meta: i64,
}

impl ReadRecord {
    /// Record for a key that existed at read time
    pub fn present(value: Value, meta: i64) -> Self {
        Self {
            value: Some(value),
            meta,
        }
    }

    /// Record for a key that was missing at read time
    pub fn missing() -> Self {
        Self {
            value: None,
            meta: 0,
        }
    }

    /// Whether the key was missing when first read
    pub fn was_missing(&self) -> bool {
        self.value.is_none()
    }
}

/// In-flight transaction state
#[derive(Debug)]
pub struct Transaction {
    /// Engine-assigned id, unique for the engine's lifetime
    pub id: TxId,
    /// Keys observed, keyed by flattened table_key
    pub read_set: FxHashMap<Vec<u8>, ReadRecord>,
    /// Values staged for commit, keyed by flattened table_key
    pub write_set: FxHashMap<Vec<u8>, Value>,
    /// Keys staged for removal at commit
    pub delete_set: FxHashSet<Vec<u8>>,
}

impl Transaction {
    /// Fresh transaction with empty state
    pub fn new(id: TxId) -> Self {
        Self {
            id,
            read_set: FxHashMap::default(),
            write_set: FxHashMap::default(),
            delete_set: FxHashSet::default(),
        }
    }

    /// Stage a write, displacing any staged delete of the same key
    pub fn stage_write(&mut self, table_key: Vec<u8>, value: Value) {
        self.delete_set.remove(&table_key);
        self.write_set.insert(table_key, value);
    }

    /// Stage a delete, displacing any staged write of the same key
    pub fn stage_delete(&mut self, table_key: Vec<u8>) {
        self.write_set.remove(&table_key);
        self.delete_set.insert(table_key);
    }

    /// Record a read snapshot unless one already exists
    ///
    /// First read wins: later reads of the same key must keep validating
    /// (OCC) or unlocking (2PL) against the original observation.
    pub fn record_read(&mut self, table_key: Vec<u8>, record: ReadRecord) {
        self.read_set.entry(table_key).or_insert(record);
    }

    /// Resolve a read against this transaction's own state
    ///
    /// Returns `None` when the key has not been touched and storage must be
    /// consulted. Returns `Some(Err(KeyNotFound))` for staged deletes and
    /// recorded misses.
    pub fn resolve_local(&self, table_key: &[u8]) -> Option<Result<Value>> {
        if let Some(value) = self.write_set.get(table_key) {
            return Some(Ok(value.clone()));
        }
        if self.delete_set.contains(table_key) {
            return Some(Err(Error::KeyNotFound));
        }
        if let Some(record) = self.read_set.get(table_key) {
            return Some(record.value.clone().ok_or(Error::KeyNotFound));
        }
        None
    }

    /// Whether the write and delete sets share no key
    ///
    /// Held as an invariant by `stage_write`/`stage_delete`; exposed for
    /// assertions in tests and commit paths.
    pub fn sets_disjoint(&self) -> bool {
        self.delete_set
            .iter()
            .all(|key| !self.write_set.contains_key(key))
    }
}
