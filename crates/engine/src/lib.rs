//! Engine facade for Trellis
//!
//! Couples the storage crate's table set with a concurrency strategy
//! behind one global mutex, and manages the process-wide lifecycle:
//! `initialize`, the operation surface (create_table, begin/commit/
//! rollback, get/set/delete/scan, batch_execute), then `shutdown`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
mod config;
mod engine;
pub mod global;

pub use batch::{BatchOp, BatchReport};
pub use config::EngineConfig;
pub use engine::Engine;
pub use global::{handle, initialize, shutdown};

pub use trellis_concurrency::{CcMode, ScanItem};
