//! The store surface consumed by the graph host
//!
//! [`KcvStore`] is a thin ordered-scan and mutation layer over the column
//! adapter: slice reads, combined delete-then-add mutations, and rowkey
//! enumeration. One store owns one engine table.

use crate::adapter::{ColumnAdapter, StorageScheme};
use crate::manager::StoreTransaction;
use std::sync::Arc;
use trellis_core::codec::{decode_columns, row_scan_start, split_key, ColumnValue};
use trellis_core::{Result, Value};
use trellis_engine::Engine;

/// Capabilities published to the graph host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreFeatures {
    /// Scans return keys in byte order
    pub ordered_scan: bool,
    /// Keys are stored ordered (not hashed) at the engine layer
    pub key_ordered: bool,
    /// Multi-operation transactions are supported
    pub transactional: bool,
    /// Data survives process restart
    pub persistent: bool,
    /// `mutate` batches deletions and additions in one call
    pub batch_mutation: bool,
    /// Per-cell or per-row expiry
    pub cell_ttl: bool,
    /// Server-assigned timestamps on cells
    pub timestamps: bool,
}

/// The feature set of this backend
pub const FEATURES: StoreFeatures = StoreFeatures {
    ordered_scan: true,
    key_ordered: true,
    transactional: true,
    persistent: false,
    batch_mutation: true,
    cell_ttl: false,
    timestamps: false,
};

/// One opened store backed by one engine table
pub struct KcvStore {
    name: String,
    engine: Arc<Engine>,
    adapter: ColumnAdapter,
}

impl KcvStore {
    pub(crate) fn new(engine: Arc<Engine>, name: impl Into<String>, scheme: StorageScheme) -> Self {
        let name = name.into();
        let adapter = ColumnAdapter::new(Arc::clone(&engine), name.clone(), scheme);
        Self {
            name,
            engine,
            adapter,
        }
    }

    /// Store (and engine table) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The scheme this store lays rows out with
    pub fn scheme(&self) -> StorageScheme {
        self.adapter.scheme()
    }

    /// Published capabilities
    pub fn features(&self) -> StoreFeatures {
        FEATURES
    }

    /// Direct access to the column adapter
    pub fn adapter(&self) -> &ColumnAdapter {
        &self.adapter
    }

    /// Cells of `rowkey` with column in `[col_start, col_end)`, ascending,
    /// truncated to `limit`
    pub fn get_slice(
        &self,
        rowkey: &[u8],
        col_start: &[u8],
        col_end: &[u8],
        limit: usize,
        tx: &StoreTransaction,
    ) -> Result<Vec<ColumnValue>> {
        self.adapter
            .get_slice(tx.id(), rowkey, col_start, col_end, limit)
    }

    /// Read one cell
    pub fn get(&self, rowkey: &[u8], column: &[u8], tx: &StoreTransaction) -> Result<Value> {
        self.adapter.get_column(tx.id(), rowkey, column)
    }

    /// Apply deletions, then additions, to one row
    ///
    /// Deletions first, so a column appearing in both lists ends up with
    /// its new value (delete-then-reinsert semantics).
    pub fn mutate(
        &self,
        rowkey: &[u8],
        additions: &[ColumnValue],
        deletions: &[Vec<u8>],
        tx: &StoreTransaction,
    ) -> Result<()> {
        for column in deletions {
            self.adapter.delete_column(tx.id(), rowkey, column)?;
        }
        self.adapter.set_columns(tx.id(), rowkey, additions)
    }

    /// Remove a whole row
    pub fn delete_row(&self, rowkey: &[u8], tx: &StoreTransaction) -> Result<()> {
        self.adapter.delete_row(tx.id(), rowkey)
    }

    /// Whether the row has at least one cell
    pub fn contains_key(&self, rowkey: &[u8], tx: &StoreTransaction) -> Result<bool> {
        self.adapter.row_exists(tx.id(), rowkey)
    }

    /// Rowkeys in `[key_start, key_end)` having at least one column in
    /// `[col_start, col_end)`, ascending, truncated to `limit` rows
    ///
    /// Bounds are required (non-empty). Under the composite scheme the
    /// cell scan yields duplicate rowkeys, one per cell, which are
    /// deduplicated here; under the serialized scheme each engine key is
    /// already one row.
    pub fn get_keys(
        &self,
        key_start: &[u8],
        key_end: &[u8],
        col_start: &[u8],
        col_end: &[u8],
        limit: usize,
        tx: &StoreTransaction,
    ) -> Result<Vec<Vec<u8>>> {
        let mut rows: Vec<Vec<u8>> = Vec::new();
        match self.scheme() {
            StorageScheme::CompositeKey => {
                // All cells of rows in [key_start, key_end): every such
                // composite key is below key_end || 0x00, and no composite
                // key equals that bound.
                let lo = row_scan_start(key_start);
                let hi = row_scan_start(key_end);
                let cells = self.engine.scan(tx.id(), &self.name, &lo, &hi, usize::MAX)?;
                for (key, _) in cells {
                    if rows.len() == limit {
                        break;
                    }
                    let (row, column) = split_key(&key)?;
                    if !col_start.is_empty() && column < col_start {
                        continue;
                    }
                    if !col_end.is_empty() && column >= col_end {
                        continue;
                    }
                    if rows.last().map(Vec::as_slice) != Some(row) {
                        rows.push(row.to_vec());
                    }
                }
            }
            StorageScheme::SerializedColumns => {
                let packed = self
                    .engine
                    .scan(tx.id(), &self.name, key_start, key_end, usize::MAX)?;
                for (row, value) in packed {
                    if rows.len() == limit {
                        break;
                    }
                    // The engine scan is inclusive; the row range is not.
                    if row.as_slice() == key_end {
                        break;
                    }
                    let any_in_window = decode_columns(&value)?.into_iter().any(|(c, _)| {
                        (col_start.is_empty() || c.as_slice() >= col_start)
                            && (col_end.is_empty() || c.as_slice() < col_end)
                    });
                    if any_in_window {
                        rows.push(row);
                    }
                }
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::PartitionMethod;
    use trellis_engine::{CcMode, EngineConfig};

    fn store(scheme: StorageScheme) -> KcvStore {
        let engine = Arc::new(Engine::new(EngineConfig::with_mode(CcMode::Serial)));
        engine
            .create_table("vertex", PartitionMethod::Range)
            .unwrap();
        KcvStore::new(engine, "vertex", scheme)
    }

    fn one_shot() -> StoreTransaction {
        StoreTransaction::one_shot()
    }

    #[test]
    fn test_features_contract() {
        let store = store(StorageScheme::CompositeKey);
        let features = store.features();
        assert!(features.ordered_scan);
        assert!(features.key_ordered);
        assert!(features.transactional);
        assert!(features.batch_mutation);
        assert!(!features.persistent);
        assert!(!features.cell_ttl);
        assert!(!features.timestamps);
    }

    #[test]
    fn test_mutate_deletes_before_adds() {
        for scheme in [StorageScheme::CompositeKey, StorageScheme::SerializedColumns] {
            let store = store(scheme);
            let tx = one_shot();
            store
                .mutate(b"r", &[(b"a".to_vec(), b"old".to_vec())], &[], &tx)
                .unwrap();

            // "a" is both deleted and re-added: the addition must win.
            store
                .mutate(
                    b"r",
                    &[(b"a".to_vec(), b"new".to_vec())],
                    &[b"a".to_vec()],
                    &tx,
                )
                .unwrap();
            assert_eq!(store.get(b"r", b"a", &tx).unwrap(), b"new");
        }
    }

    #[test]
    fn test_get_keys_dedups_rows() {
        for scheme in [StorageScheme::CompositeKey, StorageScheme::SerializedColumns] {
            let store = store(scheme);
            let tx = one_shot();
            for row in [&b"v:1"[..], b"v:2", b"v:3"] {
                store
                    .mutate(
                        row,
                        &[
                            (b"a".to_vec(), b"1".to_vec()),
                            (b"b".to_vec(), b"2".to_vec()),
                        ],
                        &[],
                        &tx,
                    )
                    .unwrap();
            }

            let rows = store
                .get_keys(b"v:1", b"v:3", b"", b"", usize::MAX, &tx)
                .unwrap();
            // End-exclusive on rows, each row once.
            assert_eq!(rows, vec![b"v:1".to_vec(), b"v:2".to_vec()]);
        }
    }

    #[test]
    fn test_get_keys_filters_by_column_window() {
        for scheme in [StorageScheme::CompositeKey, StorageScheme::SerializedColumns] {
            let store = store(scheme);
            let tx = one_shot();
            store
                .mutate(b"v:1", &[(b"aa".to_vec(), b"1".to_vec())], &[], &tx)
                .unwrap();
            store
                .mutate(b"v:2", &[(b"zz".to_vec(), b"2".to_vec())], &[], &tx)
                .unwrap();

            let rows = store
                .get_keys(b"v:1", b"v:9", b"a", b"b", usize::MAX, &tx)
                .unwrap();
            assert_eq!(rows, vec![b"v:1".to_vec()]);
        }
    }

    #[test]
    fn test_get_keys_limit() {
        let store = store(StorageScheme::CompositeKey);
        let tx = one_shot();
        for i in 1..=5u8 {
            store
                .mutate(&[b'r', i], &[(b"c".to_vec(), vec![i])], &[], &tx)
                .unwrap();
        }
        let rows = store.get_keys(b"r\x01", b"r\xff", b"", b"", 2, &tx).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_contains_key() {
        for scheme in [StorageScheme::CompositeKey, StorageScheme::SerializedColumns] {
            let store = store(scheme);
            let tx = one_shot();
            assert!(!store.contains_key(b"r", &tx).unwrap());
            store
                .mutate(b"r", &[(b"c".to_vec(), b"v".to_vec())], &[], &tx)
                .unwrap();
            assert!(store.contains_key(b"r", &tx).unwrap());
            store.delete_row(b"r", &tx).unwrap();
            assert!(!store.contains_key(b"r", &tx).unwrap());
        }
    }
}
