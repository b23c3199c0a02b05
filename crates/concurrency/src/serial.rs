//! Serial mode: one transaction at a time
//!
//! The simplest strategy and the behavioral reference for the other two.
//! With a single in-flight transaction there is nothing to lock or
//! validate: reads resolve against the transaction's own staged state and
//! fall through to storage, and commit installs the write set then erases
//! the delete set under the engine's global mutex.
//!
//! Serial mode is also the permissive one: one-shot writes apply directly
//! to storage, and hash tables may be scanned (the storage map is ordered
//! regardless of the partition method).

use crate::control::{committed_get, committed_scan, overlay_scan, unflatten};
use crate::control::{CcMode, ConcurrencyControl, ScanItem};
use crate::transaction::Transaction;
use rustc_hash::FxHashMap;
use trellis_core::codec::table_key;
use trellis_core::{Error, Result, TxId, Value, ONE_SHOT_TX};
use trellis_storage::{Entry, TableSet};

/// Single-transaction strategy
#[derive(Debug, Default)]
pub struct SerialControl {
    txns: FxHashMap<TxId, Transaction>,
    active: Option<TxId>,
    last_id: TxId,
}

impl SerialControl {
    /// Create the strategy with no transaction in flight
    pub fn new() -> Self {
        Self::default()
    }

    fn txn_mut(&mut self, tx: TxId) -> Result<&mut Transaction> {
        self.txns
            .get_mut(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })
    }

    fn take_txn(&mut self, tx: TxId) -> Result<Transaction> {
        let txn = self
            .txns
            .remove(&tx)
            .ok_or(Error::TxNotFound { tx_id: tx })?;
        self.active = None;
        Ok(txn)
    }
}

impl ConcurrencyControl for SerialControl {
    fn mode(&self) -> CcMode {
        CcMode::Serial
    }

    fn begin(&mut self) -> Result<TxId> {
        if let Some(active) = self.active {
            return Err(Error::TxAlreadyRunning { active });
        }
        self.last_id += 1;
        let id = self.last_id;
        self.txns.insert(id, Transaction::new(id));
        self.active = Some(id);
        Ok(id)
    }

    fn get(&mut self, tables: &mut TableSet, tx: TxId, table: &str, key: &[u8]) -> Result<Value> {
        if tx == ONE_SHOT_TX {
            return committed_get(tables, table, key);
        }
        let txn = self.txn_mut(tx)?;
        let flat = table_key(table, key);
        if let Some(resolved) = txn.resolve_local(&flat) {
            return resolved;
        }
        committed_get(tables, table, key)
    }

    fn set(
        &mut self,
        tables: &mut TableSet,
        tx: TxId,
        table: &str,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        if tx == ONE_SHOT_TX {
            // Auto-commit: apply directly under the global mutex.
            let (_, store) = tables.store_mut(table)?;
            store.upsert(key.to_vec(), Entry::unlocked(value.to_vec()));
            return Ok(());
        }
        tables.resolve(table)?;
        let txn = self.txn_mut(tx)?;
        txn.stage_write(table_key(table, key), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, tables: &mut TableSet, tx: TxId, table: &str, key: &[u8]) -> Result<()> {
        if tx == ONE_SHOT_TX {
            let (_, store) = tables.store_mut(table)?;
            store.erase(key);
            return Ok(());
        }
        tables.resolve(table)?;
        let txn = self.txn_mut(tx)?;
        txn.stage_delete(table_key(table, key));
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
        // require_range = false: the oracle scans hash tables too.
        let base = committed_scan(tables, table, lo, hi, usize::MAX, false)?;
        if tx == ONE_SHOT_TX {
            return Ok(base.into_iter().take(limit).collect());
        }
        let txn = self.txn_mut(tx)?;
        Ok(overlay_scan(txn, table, lo, hi, base, limit))
    }

    fn commit(&mut self, tables: &mut TableSet, tx: TxId) -> Result<()> {
        let txn = self.take_txn(tx)?;
        debug_assert!(txn.sets_disjoint());

        for (flat, value) in &txn.write_set {
            let (table, key) = unflatten(flat)?;
            let (_, store) = tables.store_mut(table)?;
            store.upsert(key.to_vec(), Entry::unlocked(value.clone()));
        }
        for flat in &txn.delete_set {
            let (table, key) = unflatten(flat)?;
            let (_, store) = tables.store_mut(table)?;
            store.erase(key);
        }
        Ok(())
    }

    fn rollback(&mut self, _tables: &mut TableSet, tx: TxId) -> Result<()> {
        self.take_txn(tx)?;
        Ok(())
    }

    fn in_flight(&self) -> usize {
        self.txns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::PartitionMethod;

    fn setup() -> (SerialControl, TableSet) {
        let mut tables = TableSet::new();
        tables.create_table("t", PartitionMethod::Hash).unwrap();
        tables.create_table("p", PartitionMethod::Range).unwrap();
        (SerialControl::new(), tables)
    }

    #[test]
    fn test_single_transaction_only() {
        let (mut cc, _tables) = setup();
        let tx = cc.begin().unwrap();
        let err = cc.begin().unwrap_err();
        assert_eq!(err, Error::TxAlreadyRunning { active: tx });
    }

    #[test]
    fn test_ids_not_reused_after_commit() {
        let (mut cc, mut tables) = setup();
        let t1 = cc.begin().unwrap();
        cc.commit(&mut tables, t1).unwrap();
        let t2 = cc.begin().unwrap();
        assert!(t2 > t1);
    }

    #[test]
    fn test_one_shot_write_and_read() {
        let (mut cc, mut tables) = setup();
        cc.set(&mut tables, ONE_SHOT_TX, "t", b"alice", b"A").unwrap();
        assert_eq!(cc.get(&mut tables, ONE_SHOT_TX, "t", b"alice").unwrap(), b"A");

        cc.set(&mut tables, ONE_SHOT_TX, "t", b"alice", b"AA").unwrap();
        assert_eq!(cc.get(&mut tables, ONE_SHOT_TX, "t", b"alice").unwrap(), b"AA");
    }

    #[test]
    fn test_staged_writes_invisible_until_commit() {
        let (mut cc, mut tables) = setup();
        let tx = cc.begin().unwrap();
        cc.set(&mut tables, tx, "t", b"bob", b"B").unwrap();

        // Inside the transaction the write is visible.
        assert_eq!(cc.get(&mut tables, tx, "t", b"bob").unwrap(), b"B");
        // One-shot reads see only committed state.
        assert!(matches!(
            cc.get(&mut tables, ONE_SHOT_TX, "t", b"bob"),
            Err(Error::KeyNotFound)
        ));

        cc.commit(&mut tables, tx).unwrap();
        assert_eq!(cc.get(&mut tables, ONE_SHOT_TX, "t", b"bob").unwrap(), b"B");
    }

    #[test]
    fn test_rollback_discards() {
        let (mut cc, mut tables) = setup();
        let tx = cc.begin().unwrap();
        cc.set(&mut tables, tx, "t", b"charlie", b"C").unwrap();
        cc.rollback(&mut tables, tx).unwrap();
        assert!(matches!(
            cc.get(&mut tables, ONE_SHOT_TX, "t", b"charlie"),
            Err(Error::KeyNotFound)
        ));
        // The id is dead after rollback.
        assert!(matches!(
            cc.get(&mut tables, tx, "t", b"charlie"),
            Err(Error::TxNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_within_transaction() {
        let (mut cc, mut tables) = setup();
        cc.set(&mut tables, ONE_SHOT_TX, "t", b"k", b"v").unwrap();

        let tx = cc.begin().unwrap();
        cc.delete(&mut tables, tx, "t", b"k").unwrap();
        assert!(matches!(
            cc.get(&mut tables, tx, "t", b"k"),
            Err(Error::KeyNotFound)
        ));
        // Still committed until the transaction commits.
        assert_eq!(cc.get(&mut tables, ONE_SHOT_TX, "t", b"k").unwrap(), b"v");

        cc.commit(&mut tables, tx).unwrap();
        assert!(matches!(
            cc.get(&mut tables, ONE_SHOT_TX, "t", b"k"),
            Err(Error::KeyNotFound)
        ));
    }

    #[test]
    fn test_delete_missing_key_succeeds() {
        let (mut cc, mut tables) = setup();
        cc.delete(&mut tables, ONE_SHOT_TX, "t", b"ghost").unwrap();
        let tx = cc.begin().unwrap();
        cc.delete(&mut tables, tx, "t", b"ghost").unwrap();
        cc.commit(&mut tables, tx).unwrap();
    }

    #[test]
    fn test_scan_allows_hash_tables() {
        let (mut cc, mut tables) = setup();
        cc.set(&mut tables, ONE_SHOT_TX, "t", b"a", b"1").unwrap();
        cc.set(&mut tables, ONE_SHOT_TX, "t", b"b", b"2").unwrap();
        let items = cc
            .scan(&mut tables, ONE_SHOT_TX, "t", b"a", b"z", 10)
            .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_scan_overlays_staged_state() {
        let (mut cc, mut tables) = setup();
        cc.set(&mut tables, ONE_SHOT_TX, "p", b"k1", b"1").unwrap();
        cc.set(&mut tables, ONE_SHOT_TX, "p", b"k3", b"3").unwrap();

        let tx = cc.begin().unwrap();
        cc.set(&mut tables, tx, "p", b"k2", b"2").unwrap();
        cc.delete(&mut tables, tx, "p", b"k3").unwrap();

        let items = cc.scan(&mut tables, tx, "p", b"k1", b"k9", 10).unwrap();
        let keys: Vec<_> = items.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![b"k1".to_vec(), b"k2".to_vec()]);
    }
}
