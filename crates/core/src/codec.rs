//! Byte-level codecs for composite keys and packed column lists
//!
//! Two fixed formats live here, both depended on by the KCV adapter for
//! row enumeration and round-trip parity:
//!
//! - **Composite key**: `rowkey || 0x00 || column`. Operands must be
//!   non-empty and free of the separator byte, which keeps `split_key`
//!   unambiguous and keeps composite keys ordered first by row, then by
//!   column.
//! - **Packed columns**: little-endian `u32` count, then for each column in
//!   strictly ascending byte order `u32 col_len, col, u32 val_len, val`.
//!
//! The same `0x00` framing is reused internally to flatten `(table, key)`
//! into the single `table_key` that transaction state is indexed by.

use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;

/// Separator byte between the two halves of a composite key
pub const KEY_SEPARATOR: u8 = 0x00;

/// Upper-bound byte for scanning all columns of one row
///
/// Every composite key of row `r` sorts strictly between `r || 0x00` and
/// `r || 0x01`, because columns are non-empty and separator-free.
pub const ROW_SCAN_END: u8 = 0x01;

fn check_operand(label: &str, operand: &[u8]) -> Result<()> {
    if operand.is_empty() {
        return Err(Error::invalid_argument(format!("{label} must not be empty")));
    }
    if operand.contains(&KEY_SEPARATOR) {
        return Err(Error::invalid_argument(format!(
            "{label} must not contain the 0x00 separator"
        )));
    }
    Ok(())
}

/// Build the composite key `rowkey || 0x00 || column`
///
/// Fails with `InvalidArgument` if either operand is empty or contains the
/// separator byte.
pub fn compose_key(rowkey: &[u8], column: &[u8]) -> Result<Vec<u8>> {
    check_operand("rowkey", rowkey)?;
    check_operand("column", column)?;
    let mut out = Vec::with_capacity(rowkey.len() + 1 + column.len());
    out.extend_from_slice(rowkey);
    out.push(KEY_SEPARATOR);
    out.extend_from_slice(column);
    Ok(out)
}

/// Split a composite key around its first separator byte
///
/// Returns `(rowkey, column)`. Fails with `InvalidArgument` when no
/// separator is present.
pub fn split_key(composite: &[u8]) -> Result<(&[u8], &[u8])> {
    match composite.iter().position(|b| *b == KEY_SEPARATOR) {
        Some(idx) => Ok((&composite[..idx], &composite[idx + 1..])),
        None => Err(Error::invalid_argument(
            "composite key has no separator byte",
        )),
    }
}

/// Inclusive lower bound of the composite-key range holding one row
pub fn row_scan_start(rowkey: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rowkey.len() + 1);
    out.extend_from_slice(rowkey);
    out.push(KEY_SEPARATOR);
    out
}

/// Inclusive upper bound of the composite-key range holding one row
///
/// No composite key can equal this bound (composite keys always contain a
/// separator), so using it inclusively never picks up a stray entry.
pub fn row_scan_end(rowkey: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rowkey.len() + 1);
    out.extend_from_slice(rowkey);
    out.push(ROW_SCAN_END);
    out
}

/// Flatten `(table, key)` into the internal transaction-state key
///
/// Table names are validated to be non-empty and separator-free when the
/// table is created, so composition here cannot fail.
pub fn table_key(table: &str, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(table.len() + 1 + key.len());
    out.extend_from_slice(table.as_bytes());
    out.push(KEY_SEPARATOR);
    out.extend_from_slice(key);
    out
}

/// Split an internal table_key back into `(table_name_bytes, key)`
pub fn split_table_key(flat: &[u8]) -> Result<(&[u8], &[u8])> {
    split_key(flat)
}

// =============================================================================
// Packed column lists
// =============================================================================

/// One `(column, value)` cell of a packed row
pub type ColumnValue = (Vec<u8>, Vec<u8>);

fn write_chunk(out: &mut Vec<u8>, chunk: &[u8]) -> Result<()> {
    let len = u32::try_from(chunk.len())
        .map_err(|_| Error::invalid_argument("column or value exceeds u32 length"))?;
    out.write_u32::<LittleEndian>(len)
        .map_err(|e| Error::unknown(e.to_string()))?;
    out.extend_from_slice(chunk);
    Ok(())
}

/// Serialize a row's columns into the packed wire format
///
/// Requirements: at least one column, every column non-empty, columns in
/// strictly ascending byte order with no duplicates. Violations fail with
/// `InvalidArgument`; the encoder never reorders on the caller's behalf.
pub fn encode_columns(columns: &[ColumnValue]) -> Result<Vec<u8>> {
    if columns.is_empty() {
        return Err(Error::invalid_argument("cannot encode an empty column list"));
    }
    let count = u32::try_from(columns.len())
        .map_err(|_| Error::invalid_argument("column count exceeds u32"))?;

    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(count)
        .map_err(|e| Error::unknown(e.to_string()))?;

    let mut prev: Option<&[u8]> = None;
    for (column, value) in columns {
        if column.is_empty() {
            return Err(Error::invalid_argument("column name must not be empty"));
        }
        if let Some(p) = prev {
            if p >= column.as_slice() {
                return Err(Error::invalid_argument(
                    "columns must be strictly ascending with no duplicates",
                ));
            }
        }
        write_chunk(&mut out, column)?;
        write_chunk(&mut out, value)?;
        prev = Some(column.as_slice());
    }
    Ok(out)
}

fn read_chunk(cursor: &mut std::io::Cursor<&[u8]>) -> Result<Vec<u8>> {
    let len = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::corrupted("short read in length prefix"))?;
    // Check against the remaining input before allocating, so a corrupted
    // length prefix cannot demand gigabytes.
    let remaining = cursor.get_ref().len() as u64 - cursor.position();
    if u64::from(len) > remaining {
        return Err(Error::corrupted("length prefix exceeds buffer"));
    }
    let mut buf = vec![0u8; len as usize];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| Error::corrupted("short read in chunk body"))?;
    Ok(buf)
}

/// Deserialize a packed row back into its `(column, value)` list
///
/// Fails with `Corrupted` on a short buffer, a zero count, trailing bytes,
/// or columns that are not strictly ascending.
pub fn decode_columns(bytes: &[u8]) -> Result<Vec<ColumnValue>> {
    let mut cursor = std::io::Cursor::new(bytes);
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::corrupted("short read in column count"))?;
    if count == 0 {
        return Err(Error::corrupted("packed row with zero columns"));
    }

    let mut columns = Vec::with_capacity(count as usize);
    let mut prev: Option<Vec<u8>> = None;
    for _ in 0..count {
        let column = read_chunk(&mut cursor)?;
        let value = read_chunk(&mut cursor)?;
        if let Some(ref p) = prev {
            if p.as_slice() >= column.as_slice() {
                return Err(Error::corrupted("columns out of order in packed row"));
            }
        }
        prev = Some(column.clone());
        columns.push((column, value));
    }

    if cursor.position() != bytes.len() as u64 {
        return Err(Error::corrupted("trailing bytes after packed row"));
    }
    Ok(columns)
}
