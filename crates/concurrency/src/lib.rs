//! Concurrency control for Trellis
//!
//! Three interchangeable strategies implement the [`ConcurrencyControl`]
//! trait over the storage crate's `TableSet`:
//!
//! - [`serial::SerialControl`]: one transaction at a time, the behavioral
//!   reference for the other two
//! - [`lock::TwoPhaseLocking`]: exclusive row locks in the entry metadata,
//!   no-wait conflicts, phantom guards on range tables
//! - [`occ::OptimisticControl`]: buffered writes with version validation
//!   at commit
//!
//! None of the strategies lock internally. The engine facade serializes
//! every call behind its global mutex; isolation comes from the protocol,
//! not from that mutex.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod control;
pub mod lock;
pub mod occ;
pub mod serial;
pub mod transaction;

pub use control::{build, CcMode, ConcurrencyControl, ScanItem};
pub use lock::TwoPhaseLocking;
pub use occ::OptimisticControl;
pub use serial::SerialControl;
pub use transaction::{ReadRecord, Transaction};
