//! The concurrency-control seam
//!
//! [`ConcurrencyControl`] is the swappable strategy interface: serial,
//! two-phase locking, and optimistic control all implement it over the same
//! [`TableSet`]. The engine facade owns one strategy behind its global
//! mutex and calls in with `&mut` access, so implementations are free of
//! internal locking.
//!
//! Strategies own their transaction registry and id allocation. Ids start
//! at 1 and are never reused; id 0 ([`ONE_SHOT_TX`]) addresses the
//! auto-commit path, which reads committed state and, outside serial mode,
//! refuses writes.

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;
use trellis_core::codec::table_key;
use trellis_core::{Error, Result, TxId, Value, ONE_SHOT_TX};
use trellis_storage::TableSet;

/// Concurrency-control mode, fixed at engine initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CcMode {
    /// One transaction at a time; the behavioral reference
    Serial,
    /// Strict two-phase locking with no-wait conflicts
    #[default]
    TwoPhase,
    /// Optimistic control with version validation at commit
    Optimistic,
}

impl fmt::Display for CcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CcMode::Serial => write!(f, "serial"),
            CcMode::TwoPhase => write!(f, "2pl"),
            CcMode::Optimistic => write!(f, "occ"),
        }
    }
}

/// Key-value pair returned by scans
pub type ScanItem = (Vec<u8>, Value);

/// Strategy interface for transactional access to a [`TableSet`]
///
/// All methods assume the caller already holds the engine's global mutex.
/// Conflict failures (`KeyLocked`, `StaleData`) leave the transaction
/// intact except where documented; the caller decides whether to roll back.
pub trait ConcurrencyControl: Send {
    /// The mode this strategy implements
    fn mode(&self) -> CcMode;

    /// Open a transaction and return its id
    fn begin(&mut self) -> Result<TxId>;

    /// Read one key
    fn get(&mut self, tables: &mut TableSet, tx: TxId, table: &str, key: &[u8]) -> Result<Value>;

    /// Stage (or, one-shot in serial mode, apply) a write
    fn set(
        &mut self,
        tables: &mut TableSet,
        tx: TxId,
        table: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<()>;

    /// Stage (or apply) a delete; deleting a missing key succeeds
    fn delete(&mut self, tables: &mut TableSet, tx: TxId, table: &str, key: &[u8]) -> Result<()>;

    /// Ascending inclusive range scan with the transaction's overlay applied
    fn scan(
        &mut self,
        tables: &mut TableSet,
        tx: TxId,
        table: &str,
        lo: &[u8],
        hi: &[u8],
        limit: usize,
    ) -> Result<Vec<ScanItem>>;

    /// Make the transaction's effects durable in the table set
    fn commit(&mut self, tables: &mut TableSet, tx: TxId) -> Result<()>;

    /// Discard the transaction; committed state is untouched
    fn rollback(&mut self, tables: &mut TableSet, tx: TxId) -> Result<()>;

    /// Number of in-flight transactions, for shutdown diagnostics
    fn in_flight(&self) -> usize;
}

/// Construct the strategy for a mode
pub fn build(mode: CcMode) -> Box<dyn ConcurrencyControl> {
    match mode {
        CcMode::Serial => Box::new(crate::serial::SerialControl::new()),
        CcMode::TwoPhase => Box::new(crate::lock::TwoPhaseLocking::new()),
        CcMode::Optimistic => Box::new(crate::occ::OptimisticControl::new()),
    }
}

// =============================================================================
// Helpers shared by the strategies
// =============================================================================

/// Committed-state point read, the one-shot `get` path
pub(crate) fn committed_get(tables: &TableSet, table: &str, key: &[u8]) -> Result<Value> {
    let (_, store) = tables.store(table)?;
    store
        .get(key)
        .map(|entry| entry.value.clone())
        .ok_or(Error::KeyNotFound)
}

/// Committed-state range scan, the one-shot `scan` path
///
/// `require_range` makes hash tables refuse the scan; the serial oracle
/// passes `false` and permits it, since the storage map is ordered either
/// way.
pub(crate) fn committed_scan(
    tables: &TableSet,
    table: &str,
    lo: &[u8],
    hi: &[u8],
    limit: usize,
    require_range: bool,
) -> Result<Vec<ScanItem>> {
    let (handle, store) = tables.store(table)?;
    if require_range && !handle.partition.supports_scan() {
        return Err(Error::unsupported(format!(
            "range scan on hash table {table}"
        )));
    }
    Ok(store
        .range_scan(lo, hi)?
        .take(limit)
        .map(|(k, entry)| (k.clone(), entry.value.clone()))
        .collect())
}

/// Merge a transaction's staged writes and deletes into base scan results
///
/// `base` holds committed `(key, value)` pairs from `[lo, hi]`. Staged
/// writes inside the window are added (new keys included), staged deletes
/// are removed, and the merge is returned ascending and truncated to
/// `limit`.
pub(crate) fn overlay_scan(
    txn: &Transaction,
    table: &str,
    lo: &[u8],
    hi: &[u8],
    base: Vec<ScanItem>,
    limit: usize,
) -> Vec<ScanItem> {
    use std::collections::BTreeMap;

    let mut merged: BTreeMap<Vec<u8>, Value> = base.into_iter().collect();
    let prefix = table_key(table, b"");

    for (flat, value) in &txn.write_set {
        if let Some(key) = flat.strip_prefix(prefix.as_slice()) {
            if key >= lo && key <= hi {
                merged.insert(key.to_vec(), value.clone());
            }
        }
    }
    for flat in &txn.delete_set {
        if let Some(key) = flat.strip_prefix(prefix.as_slice()) {
            if key >= lo && key <= hi {
                merged.remove(key);
            }
        }
    }

    merged.into_iter().take(limit).collect()
}

/// Split a flattened table_key into its table name and key
pub(crate) fn unflatten(flat: &[u8]) -> Result<(&str, &[u8])> {
    let (table_bytes, key) = trellis_core::codec::split_table_key(flat)?;
    let table = std::str::from_utf8(table_bytes)
        .map_err(|_| Error::unknown("non-utf8 table name in transaction state"))?;
    Ok((table, key))
}

/// Reject one-shot writes for modes that cannot admit them
pub(crate) fn reject_one_shot_write(tx: TxId) -> Result<()> {
    if tx == ONE_SHOT_TX {
        Err(Error::OneShotWriteNotAllowed)
    } else {
        Ok(())
    }
}
