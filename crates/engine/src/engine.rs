//! The engine facade
//!
//! [`Engine`] wires the table set and the concurrency strategy together
//! behind a single global mutex and exposes the operation surface: table
//! creation, transaction lifecycle, point reads and writes, range scans,
//! and batched execution.
//!
//! Every operation acquires the mutex for the duration of its own
//! critical section and releases it before returning. Nothing blocks or
//! performs I/O under the lock, so the critical sections are short. The
//! mutex guards data-structure integrity only; transaction isolation is
//! the strategy's job.

use crate::batch::{BatchOp, BatchReport};
use crate::config::EngineConfig;
use parking_lot::Mutex;
use trellis_concurrency::{build, CcMode, ConcurrencyControl, ScanItem};
use trellis_core::{PartitionMethod, Result, TableId, TxId, Value};
use trellis_storage::TableSet;

struct Kernel {
    tables: TableSet,
    cc: Box<dyn ConcurrencyControl>,
}

/// Transactional table engine
///
/// Normally reached through the process-wide handle managed by
/// [`crate::global`], but freestanding instances are cheap and useful in
/// tests.
pub struct Engine {
    kernel: Mutex<Kernel>,
    mode: CcMode,
}

impl Engine {
    /// Build an engine with empty state
    pub fn new(config: EngineConfig) -> Self {
        Self {
            kernel: Mutex::new(Kernel {
                tables: TableSet::new(),
                cc: build(config.mode),
            }),
            mode: config.mode,
        }
    }

    /// The concurrency mode this engine was initialized with
    pub fn mode(&self) -> CcMode {
        self.mode
    }

    /// Create a table; ids are assigned monotonically from 1
    pub fn create_table(&self, name: &str, partition: PartitionMethod) -> Result<TableId> {
        let mut kernel = self.kernel.lock();
        kernel.tables.create_table(name, partition)
    }

    /// Open a transaction
    pub fn begin_transaction(&self) -> Result<TxId> {
        let mut kernel = self.kernel.lock();
        kernel.cc.begin()
    }

    /// Commit a transaction; on conflict errors the transaction is gone
    /// and the caller starts over
    pub fn commit(&self, tx: TxId) -> Result<()> {
        let kernel = &mut *self.kernel.lock();
        kernel.cc.commit(&mut kernel.tables, tx)
    }

    /// Roll a transaction back, releasing its locks and discarding its
    /// staged state
    pub fn rollback(&self, tx: TxId) -> Result<()> {
        let kernel = &mut *self.kernel.lock();
        kernel.cc.rollback(&mut kernel.tables, tx)
    }

    /// Read one key; `tx = 0` reads committed state
    pub fn get(&self, tx: TxId, table: &str, key: &[u8]) -> Result<Value> {
        let kernel = &mut *self.kernel.lock();
        kernel.cc.get(&mut kernel.tables, tx, table, key)
    }

    /// Write one key; `tx = 0` is refused outside serial mode
    pub fn set(&self, tx: TxId, table: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let kernel = &mut *self.kernel.lock();
        kernel.cc.set(&mut kernel.tables, tx, table, key, value)
    }

    /// Delete one key; deleting a missing key succeeds
    pub fn delete(&self, tx: TxId, table: &str, key: &[u8]) -> Result<()> {
        let kernel = &mut *self.kernel.lock();
        kernel.cc.delete(&mut kernel.tables, tx, table, key)
    }

    /// Ascending scan of the inclusive range `[lo, hi]`, truncated to
    /// `limit` items
    pub fn scan(
        &self,
        tx: TxId,
        table: &str,
        lo: &[u8],
        hi: &[u8],
        limit: usize,
    ) -> Result<Vec<ScanItem>> {
        let kernel = &mut *self.kernel.lock();
        kernel.cc.scan(&mut kernel.tables, tx, table, lo, hi, limit)
    }

    /// Run an ordered list of operations under one transaction id
    ///
    /// Each operation carries its own result; see [`BatchReport::status`]
    /// for the aggregate verdict. The mutex is reacquired per operation,
    /// matching the loop a caller would otherwise write.
    pub fn batch_execute(&self, tx: TxId, ops: Vec<BatchOp>) -> BatchReport {
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            let result = match op {
                BatchOp::Get { table, key } => self.get(tx, &table, &key).map(Some),
                BatchOp::Set { table, key, value } => {
                    self.set(tx, &table, &key, &value).map(|()| None)
                }
                BatchOp::Delete { table, key } => self.delete(tx, &table, &key).map(|()| None),
            };
            results.push(result);
        }
        BatchReport { results }
    }

    /// Number of in-flight transactions
    pub fn in_flight(&self) -> usize {
        self.kernel.lock().cc.in_flight()
    }

    /// Number of tables in the catalog
    pub fn table_count(&self) -> usize {
        self.kernel.lock().tables.table_count()
    }

    /// Empty every table, keeping the catalog
    ///
    /// Test support for hosts that wipe storage between runs. Not safe to
    /// mix with in-flight transactions; callers finish or roll those back
    /// first.
    pub fn clear_all(&self) {
        self.kernel.lock().tables.clear_all();
    }
}
