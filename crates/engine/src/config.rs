//! Engine configuration

use serde::{Deserialize, Serialize};
use trellis_concurrency::CcMode;

/// Configuration consumed once at engine initialization
///
/// The concurrency mode is fixed for the engine's lifetime; switching
/// modes means shutting down and initializing again, which discards all
/// state (there is no persistence to migrate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Concurrency-control strategy for every table and transaction
    pub mode: CcMode,
}

impl EngineConfig {
    /// Config for a given mode
    pub fn with_mode(mode: CcMode) -> Self {
        Self { mode }
    }
}
