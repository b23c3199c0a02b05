//! Process-wide engine lifecycle
//!
//! One engine instance per process, held in an explicit slot rather than
//! constructed behind a hidden static. The lifecycle is
//! `initialize` → operations → `shutdown`:
//!
//! - [`initialize`] is idempotent; a second call returns the existing
//!   handle and ignores the new config.
//! - [`handle`] hands out the current `Arc<Engine>` and fails with
//!   `NotInitialized` outside the lifecycle window.
//! - [`shutdown`] drops the slot. Callers still holding an `Arc` keep a
//!   working engine until they let go, but no new handles are issued, and
//!   a later `initialize` starts from empty state.

use crate::config::EngineConfig;
use crate::engine::Engine;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};
use trellis_core::{Error, Result};

static ENGINE: Lazy<RwLock<Option<Arc<Engine>>>> = Lazy::new(|| RwLock::new(None));

/// Initialize the process-wide engine, or return the existing handle
pub fn initialize(config: EngineConfig) -> Arc<Engine> {
    let mut slot = ENGINE.write();
    match slot.as_ref() {
        Some(engine) => Arc::clone(engine),
        None => {
            info!(mode = %config.mode, "engine initialized");
            let engine = Arc::new(Engine::new(config));
            *slot = Some(Arc::clone(&engine));
            engine
        }
    }
}

/// Current engine handle
pub fn handle() -> Result<Arc<Engine>> {
    ENGINE
        .read()
        .as_ref()
        .map(Arc::clone)
        .ok_or(Error::NotInitialized)
}

/// Tear the process-wide engine down, discarding all state
///
/// Returns `true` if an engine was running. In-flight transactions are
/// discarded with their locks; a warning records how many.
pub fn shutdown() -> bool {
    let mut slot = ENGINE.write();
    match slot.take() {
        Some(engine) => {
            let live = engine.in_flight();
            if live > 0 {
                warn!(transactions = live, "shutdown discards in-flight transactions");
            }
            info!("engine shut down");
            true
        }
        None => false,
    }
}
