//! Core types and codecs for Trellis
//!
//! This crate defines the foundational pieces used throughout the engine:
//! - TableId / TxId: identifiers assigned by the catalog and the engine
//! - PartitionMethod: hash or range, advisory for scan support
//! - Error: the unified error taxonomy for every layer
//! - codec: composite-key and packed-column byte formats
//!
//! Everything here is pure and stateless; locking and lifecycle live in the
//! engine crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{KeyBytes, PartitionMethod, TableId, TxId, Value, ONE_SHOT_TX};
