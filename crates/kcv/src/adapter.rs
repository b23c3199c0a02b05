//! Column adapter: `(rowkey, column) -> value` over the flat engine
//!
//! The graph host thinks in rows and columns; the engine thinks in flat
//! byte keys. Two storage schemes bridge the gap, chosen per store when
//! the store is opened:
//!
//! - **Composite key**: every cell is its own engine row at
//!   `rowkey || 0x00 || column`. Cell operations are single engine
//!   operations and concurrent transactions can touch different columns
//!   of one row independently, but row reads are range scans, so the
//!   backing table must be `range`-partitioned.
//! - **Serialized columns**: the whole row is packed into one engine
//!   value. Row reads are one `get`, and hash tables work, but every cell
//!   mutation is a read-modify-write of the packed value and the row is
//!   the unit of conflict.
//!
//! Both schemes validate rowkeys and columns (non-empty, separator-free)
//! before anything reaches the engine, and both translate "row missing"
//! into the same `KeyNotFound` a missing column produces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use trellis_core::codec::{
    compose_key, decode_columns, encode_columns, row_scan_end, row_scan_start, split_key,
    ColumnValue,
};
use trellis_core::{Error, Result, TxId, Value};
use trellis_engine::Engine;

/// How a store lays its rows out in the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageScheme {
    /// One engine row per cell, key = `rowkey || 0x00 || column`
    #[default]
    CompositeKey,
    /// One engine row per row, value = packed column list
    SerializedColumns,
}

impl fmt::Display for StorageScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageScheme::CompositeKey => write!(f, "composite-key"),
            StorageScheme::SerializedColumns => write!(f, "serialized-columns"),
        }
    }
}

fn validate_operand(label: &str, operand: &[u8]) -> Result<()> {
    if operand.is_empty() {
        return Err(Error::invalid_argument(format!("{label} must not be empty")));
    }
    if operand.contains(&0u8) {
        return Err(Error::invalid_argument(format!(
            "{label} must not contain the 0x00 separator"
        )));
    }
    Ok(())
}

/// Row/column surface over one engine table
#[derive(Clone)]
pub struct ColumnAdapter {
    engine: Arc<Engine>,
    table: String,
    scheme: StorageScheme,
}

impl ColumnAdapter {
    /// Adapter for `table` using the given scheme
    pub fn new(engine: Arc<Engine>, table: impl Into<String>, scheme: StorageScheme) -> Self {
        Self {
            engine,
            table: table.into(),
            scheme,
        }
    }

    /// The backing table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The scheme this adapter was opened with
    pub fn scheme(&self) -> StorageScheme {
        self.scheme
    }

    /// Read the packed row, tolerating absence
    fn packed_row(&self, tx: TxId, rowkey: &[u8]) -> Result<Vec<ColumnValue>> {
        match self.engine.get(tx, &self.table, rowkey) {
            Ok(bytes) => decode_columns(&bytes),
            Err(Error::KeyNotFound) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Write the packed row back, deleting the engine key when empty
    fn store_packed_row(&self, tx: TxId, rowkey: &[u8], columns: &[ColumnValue]) -> Result<()> {
        if columns.is_empty() {
            self.engine.delete(tx, &self.table, rowkey)
        } else {
            let packed = encode_columns(columns)?;
            self.engine.set(tx, &self.table, rowkey, &packed)
        }
    }

    /// Write one cell
    pub fn set_column(&self, tx: TxId, rowkey: &[u8], column: &[u8], value: &[u8]) -> Result<()> {
        validate_operand("rowkey", rowkey)?;
        validate_operand("column", column)?;
        match self.scheme {
            StorageScheme::CompositeKey => {
                let key = compose_key(rowkey, column)?;
                self.engine.set(tx, &self.table, &key, value)
            }
            StorageScheme::SerializedColumns => {
                let mut columns = self.packed_row(tx, rowkey)?;
                match columns.binary_search_by(|(c, _)| c.as_slice().cmp(column)) {
                    Ok(idx) => columns[idx].1 = value.to_vec(),
                    Err(idx) => columns.insert(idx, (column.to_vec(), value.to_vec())),
                }
                self.store_packed_row(tx, rowkey, &columns)
            }
        }
    }

    /// Read one cell; a missing row and a missing column both fail
    /// `KeyNotFound`
    pub fn get_column(&self, tx: TxId, rowkey: &[u8], column: &[u8]) -> Result<Value> {
        validate_operand("rowkey", rowkey)?;
        validate_operand("column", column)?;
        match self.scheme {
            StorageScheme::CompositeKey => {
                let key = compose_key(rowkey, column)?;
                self.engine.get(tx, &self.table, &key)
            }
            StorageScheme::SerializedColumns => {
                let columns = self.packed_row(tx, rowkey)?;
                columns
                    .binary_search_by(|(c, _)| c.as_slice().cmp(column))
                    .map(|idx| columns[idx].1.clone())
                    .map_err(|_| Error::KeyNotFound)
            }
        }
    }

    /// Remove one cell; removing an absent cell succeeds
    pub fn delete_column(&self, tx: TxId, rowkey: &[u8], column: &[u8]) -> Result<()> {
        validate_operand("rowkey", rowkey)?;
        validate_operand("column", column)?;
        match self.scheme {
            StorageScheme::CompositeKey => {
                let key = compose_key(rowkey, column)?;
                self.engine.delete(tx, &self.table, &key)
            }
            StorageScheme::SerializedColumns => {
                let mut columns = self.packed_row(tx, rowkey)?;
                if let Ok(idx) = columns.binary_search_by(|(c, _)| c.as_slice().cmp(column)) {
                    columns.remove(idx);
                    self.store_packed_row(tx, rowkey, &columns)?;
                }
                Ok(())
            }
        }
    }

    /// All cells of a row, ascending by column; empty when the row is
    /// absent
    pub fn get_all_columns(&self, tx: TxId, rowkey: &[u8]) -> Result<Vec<ColumnValue>> {
        self.get_slice(tx, rowkey, b"", b"", usize::MAX)
    }

    /// Cells of a row with column in `[col_start, col_end)`, ascending,
    /// truncated to `limit`
    ///
    /// An empty `col_start` means "from the first column"; an empty
    /// `col_end` means "through the last". The engine scan underneath is
    /// inclusive, so the exclusive upper bound is applied by filtering.
    pub fn get_slice(
        &self,
        tx: TxId,
        rowkey: &[u8],
        col_start: &[u8],
        col_end: &[u8],
        limit: usize,
    ) -> Result<Vec<ColumnValue>> {
        validate_operand("rowkey", rowkey)?;
        if !col_start.is_empty() && !col_end.is_empty() && col_start > col_end {
            return Err(Error::invalid_argument("column range start exceeds end"));
        }
        match self.scheme {
            StorageScheme::CompositeKey => {
                let lo = if col_start.is_empty() {
                    row_scan_start(rowkey)
                } else {
                    compose_key(rowkey, col_start)?
                };
                let hi = row_scan_end(rowkey);
                let items = self.engine.scan(tx, &self.table, &lo, &hi, usize::MAX)?;

                let mut out = Vec::new();
                for (key, value) in items {
                    if out.len() == limit {
                        break;
                    }
                    let (row, column) = split_key(&key)?;
                    debug_assert_eq!(row, rowkey, "scan bounds leaked another row");
                    if !col_end.is_empty() && column >= col_end {
                        break;
                    }
                    out.push((column.to_vec(), value));
                }
                Ok(out)
            }
            StorageScheme::SerializedColumns => {
                let columns = self.packed_row(tx, rowkey)?;
                Ok(columns
                    .into_iter()
                    .filter(|(c, _)| col_start.is_empty() || c.as_slice() >= col_start)
                    .take_while(|(c, _)| col_end.is_empty() || c.as_slice() < col_end)
                    .take(limit)
                    .collect())
            }
        }
    }

    /// Remove a whole row; removing an absent row succeeds
    pub fn delete_row(&self, tx: TxId, rowkey: &[u8]) -> Result<()> {
        validate_operand("rowkey", rowkey)?;
        match self.scheme {
            StorageScheme::CompositeKey => {
                let lo = row_scan_start(rowkey);
                let hi = row_scan_end(rowkey);
                let cells = self.engine.scan(tx, &self.table, &lo, &hi, usize::MAX)?;
                for (key, _) in cells {
                    self.engine.delete(tx, &self.table, &key)?;
                }
                Ok(())
            }
            StorageScheme::SerializedColumns => self.engine.delete(tx, &self.table, rowkey),
        }
    }

    /// Write several cells of one row
    ///
    /// Under the serialized scheme this is one read-modify-write rather
    /// than one per cell.
    pub fn set_columns(&self, tx: TxId, rowkey: &[u8], additions: &[ColumnValue]) -> Result<()> {
        validate_operand("rowkey", rowkey)?;
        match self.scheme {
            StorageScheme::CompositeKey => {
                for (column, value) in additions {
                    self.set_column(tx, rowkey, column, value)?;
                }
                Ok(())
            }
            StorageScheme::SerializedColumns => {
                for (column, _) in additions {
                    validate_operand("column", column)?;
                }
                let mut columns = self.packed_row(tx, rowkey)?;
                for (column, value) in additions {
                    match columns.binary_search_by(|(c, _)| c.as_slice().cmp(column.as_slice())) {
                        Ok(idx) => columns[idx].1 = value.clone(),
                        Err(idx) => columns.insert(idx, (column.clone(), value.clone())),
                    }
                }
                if additions.is_empty() {
                    return Ok(());
                }
                self.store_packed_row(tx, rowkey, &columns)
            }
        }
    }

    /// Whether the row has at least one cell
    pub fn row_exists(&self, tx: TxId, rowkey: &[u8]) -> Result<bool> {
        Ok(!self.get_slice(tx, rowkey, b"", b"", 1)?.is_empty())
    }
}
