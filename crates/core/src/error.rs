//! Error types for the Trellis engine
//!
//! One unified error enum covers every layer: catalog, storage, concurrency
//! control, the engine facade, and the KCV adapter. We use `thiserror` for
//! the `Display` and `Error` impls.
//!
//! ## Error Categories
//!
//! - **Lifecycle**: engine used outside its initialize/shutdown window
//! - **Catalog**: table creation and lookup failures
//! - **Transaction**: unknown or conflicting transaction ids
//! - **Conflict**: lock conflicts (2PL) and stale reads (OCC); these are the
//!   retryable kinds
//! - **Validation**: malformed keys, columns, or scan ranges
//! - **Data**: missing keys and corrupted packed values
//!
//! Conflict errors are transaction-fatal: the caller is expected to roll the
//! transaction back and start over. Nothing is retried inside the engine.

use thiserror::Error;

/// Result type alias for Trellis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the Trellis engine and its KCV surface
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Engine facade used before `initialize` or after `shutdown`
    #[error("engine not initialized")]
    NotInitialized,

    /// Duplicate table name passed to `create_table`
    #[error("table already exists: {name}")]
    TableExists {
        /// The conflicting table name
        name: String,
    },

    /// Operation names a table the catalog has never seen
    #[error("table not found: {name}")]
    TableNotFound {
        /// The unknown table name
        name: String,
    },

    /// Partition method was neither `hash` nor `range`
    #[error("invalid partition method: {method}")]
    InvalidPartitionMethod {
        /// The rejected method string
        method: String,
    },

    /// Transaction id is unknown, already committed, or already rolled back
    #[error("transaction not found: {tx_id}")]
    TxNotFound {
        /// The unknown transaction id
        tx_id: u64,
    },

    /// Serial mode admits one transaction at a time
    #[error("transaction {active} already running")]
    TxAlreadyRunning {
        /// Id of the transaction currently in flight
        active: u64,
    },

    /// Key absent from the table (or column absent from the row, at the
    /// adapter layer)
    #[error("key not found")]
    KeyNotFound,

    /// Another transaction holds the exclusive lock on this key
    ///
    /// The no-wait deadlock policy surfaces every lock conflict immediately
    /// instead of blocking. Retryable after rollback.
    #[error("key locked by transaction {owner}")]
    KeyLocked {
        /// Id of the lock-holding transaction
        owner: u64,
    },

    /// Optimistic validation found a read whose version moved under us
    ///
    /// Retryable after rollback.
    #[error("stale read at commit: recorded version {recorded}, current {current}")]
    StaleData {
        /// Version recorded in the read set
        recorded: i64,
        /// Version found in storage at commit time
        current: i64,
    },

    /// Writes and deletes with tx id 0 cannot join a locking or versioning
    /// protocol, so 2PL and OCC reject them outright
    #[error("one-shot writes are not allowed under this concurrency mode")]
    OneShotWriteNotAllowed,

    /// Operation not supported by the table's partition method
    #[error("unsupported operation: {reason}")]
    UnsupportedOperation {
        /// Why the operation was refused
        reason: String,
    },

    /// Malformed input: empty operand, embedded separator byte, or an
    /// inverted scan range
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the input
        reason: String,
    },

    /// A packed column value failed to decode
    #[error("corrupted value: {reason}")]
    Corrupted {
        /// What the decoder tripped on
        reason: String,
    },

    /// Batch finished with at least one failed operation
    #[error("batch partially succeeded: {failed} of {total} operations failed")]
    PartialSuccess {
        /// Number of failed operations
        failed: usize,
        /// Number of operations attempted
        total: usize,
    },

    /// Catch-all for failures no other kind describes
    #[error("unknown error: {message}")]
    Unknown {
        /// Free-form diagnostic
        message: String,
    },
}

impl Error {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a TableExists error
    pub fn table_exists(name: impl Into<String>) -> Self {
        Error::TableExists { name: name.into() }
    }

    /// Create a TableNotFound error
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Create an InvalidPartitionMethod error
    pub fn invalid_partition_method(method: impl Into<String>) -> Self {
        Error::InvalidPartitionMethod {
            method: method.into(),
        }
    }

    /// Create an UnsupportedOperation error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Error::UnsupportedOperation {
            reason: reason.into(),
        }
    }

    /// Create an InvalidArgument error
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a Corrupted error
    pub fn corrupted(reason: impl Into<String>) -> Self {
        Error::Corrupted {
            reason: reason.into(),
        }
    }

    /// Create an Unknown error
    pub fn unknown(message: impl Into<String>) -> Self {
        Error::Unknown {
            message: message.into(),
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Check if this is a concurrency conflict (`KeyLocked` or `StaleData`)
    ///
    /// Conflicts are the only retryable failures: roll back, begin a fresh
    /// transaction, and replay the work.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::KeyLocked { .. } | Error::StaleData { .. })
    }

    /// Check if retrying the whole transaction can succeed
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }

    /// Check if this is a "not found" kind (`KeyNotFound` or `TableNotFound`)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound | Error::TableNotFound { .. })
    }

    /// Check if this is an input-validation failure
    ///
    /// Validation failures cannot be fixed by retrying; the input must change.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument { .. } | Error::InvalidPartitionMethod { .. }
        )
    }
}
