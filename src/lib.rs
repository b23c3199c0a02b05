//! # Trellis
//!
//! A transactional, in-memory key-value table engine built to back a
//! property-graph database, plus the key-column-value (KCV) layer the
//! graph host consumes.
//!
//! Data is organized into named tables of opaque byte keys and values.
//! Transactions may read, write, delete, and range-scan under one of
//! three interchangeable concurrency strategies: serial (one transaction
//! at a time), strict two-phase locking with no-wait conflicts, or
//! optimistic control with commit-time validation. Nothing persists:
//! process exit loses all data by design.
//!
//! # Quick Start
//!
//! ```no_run
//! use trellis::{CcMode, StorageScheme, StoreManager, StoreManagerConfig, TransactionConfig};
//!
//! fn main() -> trellis::Result<()> {
//!     let manager = StoreManager::open(StoreManagerConfig {
//!         mode: CcMode::TwoPhase,
//!         scheme: StorageScheme::CompositeKey,
//!     });
//!     let vertices = manager.open_store("vertexstore")?;
//!
//!     let tx = manager.begin_transaction(TransactionConfig::default())?;
//!     vertices.mutate(
//!         b"v:1",
//!         &[(b"name".to_vec(), b"Alice".to_vec())],
//!         &[],
//!         &tx,
//!     )?;
//!     manager.commit(tx)?;
//!
//!     let read = trellis::StoreTransaction::one_shot();
//!     assert_eq!(vertices.get(b"v:1", b"name", &read)?, b"Alice");
//!
//!     manager.close();
//!     Ok(())
//! }
//! ```
//!
//! # Layers
//!
//! | Layer | Crate | Surface |
//! |-------|-------|---------|
//! | **Engine** | `trellis-engine` | tables of `key -> value`, transactions, scans |
//! | **Adapter** | `trellis-kcv` | `(rowkey, column) -> value` over two storage schemes |
//! | **Store** | `trellis-kcv` | slice reads, batched mutation, rowkey enumeration |
//!
//! The engine facade is also usable directly: [`initialize`] /
//! [`shutdown`] manage the process-wide instance, and [`Engine`] exposes
//! the nine core operations for callers that do not need the KCV view.

// Engine surface
pub use trellis_engine::{
    handle, initialize, shutdown, BatchOp, BatchReport, CcMode, Engine, EngineConfig, ScanItem,
};

// KCV surface
pub use trellis_kcv::{
    ColumnAdapter, IsolationLevel, KcvStore, StorageScheme, StoreFeatures, StoreManager,
    StoreManagerConfig, StoreTransaction, TransactionConfig, FEATURES,
};

// Core types
pub use trellis_core::{codec, Error, KeyBytes, PartitionMethod, Result, TableId, TxId, Value};
