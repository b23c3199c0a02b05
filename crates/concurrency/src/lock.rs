//! Strict two-phase locking with no-wait conflict handling
//!
//! Every row a transaction touches is locked exclusively by stamping the
//! transaction id into the entry's metadata word (0 means free). Locks are
//! held until commit or rollback; a conflicting acquisition fails
//! immediately with `KeyLocked` instead of waiting, which rules out
//! deadlock at the cost of retries under contention.
//!
//! # Phantom guards
//!
//! A read miss on a `range` table inserts a placeholder entry, locked by
//! the reader, so no other transaction can create the key before the
//! reader finishes. Guards are invisible to reads and scans (the owner
//! sees its own miss; everyone else conflicts on the lock) and are removed
//! at commit or rollback unless a staged write materialized the key. Hash
//! tables skip guards: a miss takes no lock, and two transactions may both
//! create the same key with last-commit-wins.
//!
//! # Scans
//!
//! A scan locks every entry it visits. On the first conflict it releases
//! the locks acquired by that scan (earlier locks of the same transaction
//! stay held) and fails with `KeyLocked`.

use crate::control::{
    committed_get, overlay_scan, reject_one_shot_write, unflatten, CcMode, ConcurrencyControl,
    ScanItem,
};
use crate::transaction::{ReadRecord, Transaction};
use rustc_hash::{FxHashMap, FxHashSet};
use trellis_core::codec::table_key;
use trellis_core::{Error, Result, TxId, Value, ONE_SHOT_TX};
use trellis_storage::{Entry, TableSet, META_UNLOCKED};

/// Exclusive row-lock strategy
#[derive(Debug, Default)]
pub struct TwoPhaseLocking {
    txns: FxHashMap<TxId, Transaction>,
    /// Flattened table_keys of phantom-guard placeholders currently in
    /// storage. Guards are always locked by their owner.
    guards: FxHashSet<Vec<u8>>,
    last_id: TxId,
}

/// Lock one key for a transaction, returning the committed value if any
///
/// On a hit: stamps the transaction id (or fails `KeyLocked`) and records
/// the read. On a miss: inserts a phantom guard on range tables, records
/// the miss, and returns `None`. A free function so the caller can keep
/// disjoint borrows of the transaction and the guard set.
fn acquire(
    guards: &mut FxHashSet<Vec<u8>>,
    tables: &mut TableSet,
    txn: &mut Transaction,
    table: &str,
    key: &[u8],
    flat: &[u8],
) -> Result<Option<Value>> {
    let (handle, store) = tables.store_mut(table)?;
    match store.get_mut(key) {
        Some(entry) => {
            let owner = entry.meta;
            if owner != META_UNLOCKED && owner != txn.id as i64 {
                return Err(Error::KeyLocked {
                    owner: owner as u64,
                });
            }
            entry.meta = txn.id as i64;
            if guards.contains(flat) {
                // Our own phantom guard: the key is still logically absent.
                txn.record_read(flat.to_vec(), ReadRecord::missing());
                Ok(None)
            } else {
                let value = entry.value.clone();
                txn.record_read(flat.to_vec(), ReadRecord::present(value.clone(), owner));
                Ok(Some(value))
            }
        }
        None => {
            if handle.partition.supports_scan() {
                store.upsert(key.to_vec(), Entry::new(Vec::new(), txn.id as i64));
                guards.insert(flat.to_vec());
                txn.record_read(flat.to_vec(), ReadRecord::missing());
            }
            Ok(None)
        }
    }
}

impl TwoPhaseLocking {
    /// Create the strategy with no transactions and no guards
    pub fn new() -> Self {
        Self::default()
    }

    fn release_one(
        guards: &mut FxHashSet<Vec<u8>>,
        tables: &mut TableSet,
        tx_id: TxId,
        flat: &[u8],
        record: &ReadRecord,
    ) -> Result<()> {
        let (table, key) = unflatten(flat)?;
        let (_, store) = tables.store_mut(table)?;
        if record.was_missing() {
            // Phantom guard that never materialized.
            store.erase(key);
            guards.remove(flat);
        } else if let Some(entry) = store.get_mut(key) {
            if entry.meta == tx_id as i64 {
                entry.meta = META_UNLOCKED;
            }
        }
        Ok(())
    }
}

impl ConcurrencyControl for TwoPhaseLocking {
    fn mode(&self) -> CcMode {
        CcMode::TwoPhase
    }

    fn begin(&mut self) -> Result<TxId> {
        self.last_id += 1;
        let id = self.last_id;
        self.txns.insert(id, Transaction::new(id));
        Ok(id)
    }

    fn get(&mut self, tables: &mut TableSet, tx: TxId, table: &str, key: &[u8]) -> Result<Value> {
        if tx == ONE_SHOT_TX {
            let flat = table_key(table, key);
            if self.guards.contains(&flat) {
                return Err(Error::KeyNotFound);
            }
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
        match acquire(&mut self.guards, tables, txn, table, key, &flat)? {
            Some(value) => Ok(value),
            None => Err(Error::KeyNotFound),
        }
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
        let txn = self
            .txns
            .get_mut(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        let flat = table_key(table, key);
        if !txn.read_set.contains_key(&flat) && !txn.write_set.contains_key(&flat) {
            acquire(&mut self.guards, tables, txn, table, key, &flat)?;
        } else {
            tables.resolve(table)?;
        }
        txn.stage_write(flat, value.to_vec());
        Ok(())
    }

    fn delete(&mut self, tables: &mut TableSet, tx: TxId, table: &str, key: &[u8]) -> Result<()> {
        reject_one_shot_write(tx)?;
        let txn = self
            .txns
            .get_mut(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        let flat = table_key(table, key);
        if !txn.read_set.contains_key(&flat) && !txn.write_set.contains_key(&flat) {
            acquire(&mut self.guards, tables, txn, table, key, &flat)?;
        } else {
            tables.resolve(table)?;
        }
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
        let guards = &mut self.guards;

        if tx == ONE_SHOT_TX {
            let (handle, store) = tables.store(table)?;
            if !handle.partition.supports_scan() {
                return Err(Error::unsupported(format!(
                    "range scan on hash table {table}"
                )));
            }
            return Ok(store
                .range_scan(lo, hi)?
                .filter(|(k, _)| !guards.contains(&table_key(table, k)))
                .take(limit)
                .map(|(k, entry)| (k.clone(), entry.value.clone()))
                .collect());
        }

        let txn = self
            .txns
            .get_mut(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        let (handle, store) = tables.store_mut(table)?;
        if !handle.partition.supports_scan() {
            return Err(Error::unsupported(format!(
                "range scan on hash table {table}"
            )));
        }

        // Lock pass. Locks taken by this scan are tracked so a conflict can
        // release them without touching locks from earlier operations.
        let keys = store.range_keys(lo, hi)?;
        let mut acquired: Vec<Vec<u8>> = Vec::new();
        for key in &keys {
            let flat = table_key(table, key);
            if txn.read_set.contains_key(&flat)
                || txn.write_set.contains_key(&flat)
                || txn.delete_set.contains(&flat)
            {
                continue;
            }
            let Some(entry) = store.get_mut(key) else {
                continue;
            };
            if entry.meta == META_UNLOCKED {
                entry.meta = txn.id as i64;
                txn.record_read(
                    flat,
                    ReadRecord::present(entry.value.clone(), META_UNLOCKED),
                );
                acquired.push(key.clone());
            } else if entry.meta != txn.id as i64 {
                let owner = entry.meta as u64;
                tracing::debug!(tx_id = tx, owner, released = acquired.len(), "scan conflict");
                for prior in &acquired {
                    if let Some(held) = store.get_mut(prior) {
                        held.meta = META_UNLOCKED;
                    }
                    txn.read_set.remove(&table_key(table, prior));
                }
                return Err(Error::KeyLocked { owner });
            }
        }

        let base: Vec<ScanItem> = store
            .range_scan(lo, hi)?
            .filter(|(k, _)| !guards.contains(&table_key(table, k)))
            .map(|(k, entry)| (k.clone(), entry.value.clone()))
            .collect();
        Ok(overlay_scan(txn, table, lo, hi, base, limit))
    }

    fn commit(&mut self, tables: &mut TableSet, tx: TxId) -> Result<()> {
        let txn = self
            .txns
            .remove(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        debug_assert!(txn.sets_disjoint());

        for (flat, value) in &txn.write_set {
            let (table, key) = unflatten(flat)?;
            let (_, store) = tables.store_mut(table)?;
            store.upsert(key.to_vec(), Entry::unlocked(value.clone()));
            self.guards.remove(flat);
        }
        for flat in &txn.delete_set {
            let (table, key) = unflatten(flat)?;
            let (_, store) = tables.store_mut(table)?;
            store.erase(key);
            self.guards.remove(flat);
        }
        for (flat, record) in &txn.read_set {
            if txn.write_set.contains_key(flat) || txn.delete_set.contains(flat) {
                continue;
            }
            Self::release_one(&mut self.guards, tables, tx, flat, record)?;
        }
        Ok(())
    }

    fn rollback(&mut self, tables: &mut TableSet, tx: TxId) -> Result<()> {
        let txn = self
            .txns
            .remove(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        // Every lock this transaction holds is in the read set, including
        // those taken for staged writes and deletes.
        for (flat, record) in &txn.read_set {
            Self::release_one(&mut self.guards, tables, tx, flat, record)?;
        }
        Ok(())
    }

    fn in_flight(&self) -> usize {
        self.txns.len()
    }
}
