//! Optimistic concurrency control with commit-time validation
//!
//! Transactions run without locks. Every read records the key's version
//! (0 when the key is missing) in the read set; writes and deletes are
//! buffered. Commit validates the whole read set against current storage
//! under the engine's global mutex: any version that moved, including a
//! missing key that appeared or a present key that vanished, fails the
//! transaction with `StaleData`. Validation and application happen inside
//! one critical section, so a validated transaction installs atomically.
//!
//! First-committer-wins: of two racing transactions that read the same
//! key, whichever commits first bumps the version and dooms the other.
//!
//! A delete performs an implicit read so the pre-transaction version is
//! always in the read set. Without it, a blind delete would race an
//! overlapping writer with no conflict ever detected.

use crate::control::{
    committed_get, committed_scan, overlay_scan, reject_one_shot_write, unflatten, CcMode,
    ConcurrencyControl, ScanItem,
};
use crate::transaction::{ReadRecord, Transaction};
use rustc_hash::FxHashMap;
use trellis_core::codec::table_key;
use trellis_core::{Error, Result, TxId, Value, ONE_SHOT_TX};
use trellis_storage::{Entry, TableSet, META_FIRST_VERSION};

/// Validate-then-write strategy
#[derive(Debug, Default)]
pub struct OptimisticControl {
    txns: FxHashMap<TxId, Transaction>,
    last_id: TxId,
}

impl OptimisticControl {
    /// Create the strategy with no transactions in flight
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the key's current version in the read set if absent
    fn observe(
        tables: &TableSet,
        txn: &mut Transaction,
        table: &str,
        key: &[u8],
        flat: &[u8],
    ) -> Result<()> {
        if txn.read_set.contains_key(flat) {
            return Ok(());
        }
        let (_, store) = tables.store(table)?;
        let record = match store.get(key) {
            Some(entry) => ReadRecord::present(entry.value.clone(), entry.meta),
            None => ReadRecord::missing(),
        };
        txn.record_read(flat.to_vec(), record);
        Ok(())
    }
}

impl ConcurrencyControl for OptimisticControl {
    fn mode(&self) -> CcMode {
        CcMode::Optimistic
    }

    fn begin(&mut self) -> Result<TxId> {
        self.last_id += 1;
        let id = self.last_id;
        self.txns.insert(id, Transaction::new(id));
        Ok(id)
    }

    fn get(&mut self, tables: &mut TableSet, tx: TxId, table: &str, key: &[u8]) -> Result<Value> {
        if tx == ONE_SHOT_TX {
            return committed_get(tables, table, key);
        }
        let txn = self
            .txns
            .get_mut(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        let flat = table_key(table, key);
        if let Some(resolved) = txn.resolve_local(&flat) {
            return resolved;
        }
        Self::observe(tables, txn, table, key, &flat)?;
        txn.read_set
            .get(&flat)
            .and_then(|record| record.value.clone())
            .ok_or(Error::KeyNotFound)
    }

    fn set(
        &mut self,
        tables: &mut TableSet,
        tx: TxId,
        table: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        reject_one_shot_write(tx)?;
        tables.resolve(table)?;
        let txn = self
            .txns
            .get_mut(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        txn.stage_write(table_key(table, key), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, tables: &mut TableSet, tx: TxId, table: &str, key: &[u8]) -> Result<()> {
        reject_one_shot_write(tx)?;
        let txn = self
            .txns
            .get_mut(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        let flat = table_key(table, key);
        // Implicit read: the pre-transaction version must be validated at
        // commit, or a concurrent writer would race this delete unnoticed.
        Self::observe(tables, txn, table, key, &flat)?;
        txn.stage_delete(flat);
        Ok(())
    }

    fn scan(
        &mut self,
        tables: &mut TableSet,
        tx: TxId,
        table: &str,
        lo: &[u8],
        hi: &[u8],
        limit: usize,
    ) -> Result<Vec<ScanItem>> {
        if tx == ONE_SHOT_TX {
            return committed_scan(tables, table, lo, hi, limit, true);
        }
        let txn = self
            .txns
            .get_mut(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        let (handle, store) = tables.store(table)?;
        if !handle.partition.supports_scan() {
            return Err(Error::unsupported(format!(
                "range scan on hash table {table}"
            )));
        }

        // Snapshot every visited version so the whole window validates at
        // commit time.
        let mut base = Vec::new();
        for (key, entry) in store.range_scan(lo, hi)? {
            txn.record_read(
                table_key(table, key),
                ReadRecord::present(entry.value.clone(), entry.meta),
            );
            base.push((key.clone(), entry.value.clone()));
        }
        Ok(overlay_scan(txn, table, lo, hi, base, limit))
    }

    fn commit(&mut self, tables: &mut TableSet, tx: TxId) -> Result<()> {
        // The transaction is destroyed whether validation passes or not.
        let txn = self
            .txns
            .remove(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        debug_assert!(txn.sets_disjoint());

        // Validation pass: every recorded version must still be current,
        // with "missing" counted as version 0.
        for (flat, record) in &txn.read_set {
            let (table, key) = unflatten(flat)?;
            let (_, store) = tables.store(table)?;
            let current = store.get(key).map(|entry| entry.meta).unwrap_or(0);
            let recorded = if record.was_missing() { 0 } else { record.meta };
            if current != recorded {
                tracing::debug!(tx_id = tx, recorded, current, "commit validation failed");
                return Err(Error::StaleData { recorded, current });
            }
        }

        // Write pass: bump versions, install, erase.
        for (flat, value) in &txn.write_set {
            let (table, key) = unflatten(flat)?;
            let (_, store) = tables.store_mut(table)?;
            let version = match store.get(key) {
                Some(entry) => entry.meta + 1,
                None => META_FIRST_VERSION,
            };
            store.upsert(key.to_vec(), Entry::new(value.clone(), version));
        }
        for flat in &txn.delete_set {
            let (table, key) = unflatten(flat)?;
            let (_, store) = tables.store_mut(table)?;
            store.erase(key);
        }
        Ok(())
    }

    fn rollback(&mut self, _tables: &mut TableSet, tx: TxId) -> Result<()> {
        self.txns
            .remove(&tx)
            .map(|_| ())
            .ok_or(Error::TxNotFound { tx_id: tx })
    }

    fn in_flight(&self) -> usize {
        self.txns.len()
    }
}
