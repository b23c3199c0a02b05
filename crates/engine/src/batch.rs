//! Batched operation execution
//!
//! A batch is sugar for a loop: the operations run in order under one
//! transaction id, each producing its own result, with no atomicity across
//! operations. A failed op does not stop the batch and does not undo
//! earlier ops; callers wanting all-or-nothing wrap the batch in a real
//! transaction and roll back on a dirty report.

use trellis_core::{Error, Result, Value};

/// One operation in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Point read
    Get {
        /// Table name
        table: String,
        /// Key bytes
        key: Vec<u8>,
    },
    /// Point write
    Set {
        /// Table name
        table: String,
        /// Key bytes
        key: Vec<u8>,
        /// Value bytes
        value: Vec<u8>,
    },
    /// Point delete
    Delete {
        /// Table name
        table: String,
        /// Key bytes
        key: Vec<u8>,
    },
}

/// Per-operation outcomes of a batch
///
/// `Get` ops yield `Some(value)`, mutations yield `None`.
#[derive(Debug)]
pub struct BatchReport {
    /// One result per submitted operation, in submission order
    pub results: Vec<Result<Option<Value>>>,
}

impl BatchReport {
    /// Overall status: `Ok` when every op succeeded, `PartialSuccess`
    /// otherwise
    pub fn status(&self) -> Result<()> {
        let failed = self.results.iter().filter(|r| r.is_err()).count();
        if failed == 0 {
            Ok(())
        } else {
            Err(Error::PartialSuccess {
                failed,
                total: self.results.len(),
            })
        }
    }

    /// Whether every operation succeeded
    pub fn is_clean(&self) -> bool {
        self.results.iter().all(|r| r.is_ok())
    }
}
