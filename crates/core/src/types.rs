//! Core types for the Trellis engine
//!
//! - TableId: catalog-assigned table identifier
//! - TxId: transaction identifier, with 0 reserved for one-shot operations
//! - PartitionMethod: hash or range, advisory for scan support
//! - Value / KeyBytes: opaque byte strings

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque value bytes
pub type Value = Vec<u8>;

/// Opaque key bytes
pub type KeyBytes = Vec<u8>;

/// Transaction identifier
///
/// Real transactions get ids from 1 upward and an id is never reused after
/// commit or rollback. Id 0 is the one-shot pseudo-transaction: reads and
/// scans against committed state, auto-committed writes where the mode
/// allows them.
pub type TxId = u64;

/// The reserved one-shot transaction id
pub const ONE_SHOT_TX: TxId = 0;

/// Catalog-assigned table identifier
///
/// Ids start at 1 and increase monotonically with each `create_table`.
/// Tables are never dropped, so an id stays valid for the life of the
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(u32);

impl TableId {
    /// Wrap a raw id
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The first id the catalog hands out
    pub fn first() -> Self {
        Self(1)
    }

    /// The id following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw numeric value
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Table partition method
///
/// Advisory rather than physical: both methods store into the same ordered
/// map. `Range` promises ordered scans; `Hash` lets the concurrency layer
/// refuse them and skip phantom protection on read misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionMethod {
    /// Point lookups only under 2PL/OCC
    Hash,
    /// Ordered scans supported everywhere
    Range,
}

impl PartitionMethod {
    /// Whether ordered scans are part of this table's contract
    pub fn supports_scan(self) -> bool {
        matches!(self, PartitionMethod::Range)
    }
}

impl FromStr for PartitionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hash" => Ok(PartitionMethod::Hash),
            "range" => Ok(PartitionMethod::Range),
            other => Err(Error::invalid_partition_method(other)),
        }
    }
}

impl fmt::Display for PartitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionMethod::Hash => write!(f, "hash"),
            PartitionMethod::Range => write!(f, "range"),
        }
    }
}
