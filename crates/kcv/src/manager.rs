//! Store manager: engine lifecycle, open stores, transactions
//!
//! The [`StoreManager`] is what the graph host holds. It brings the
//! process-wide engine up when constructed, keeps a registry of opened
//! stores, issues transaction handles, and tears the engine down again on
//! [`StoreManager::close`].

use crate::adapter::StorageScheme;
use crate::store::{KcvStore, StoreFeatures, FEATURES};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use trellis_core::{Error, PartitionMethod, Result, TxId, ONE_SHOT_TX};
use trellis_engine::{CcMode, Engine, EngineConfig};

/// Manager configuration, consumed once at open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreManagerConfig {
    /// Concurrency mode for the backing engine
    pub mode: CcMode,
    /// Row layout for every store this manager opens
    pub scheme: StorageScheme,
}

/// Isolation level requested by the host
///
/// Accepted for interface compatibility and currently ignored: the engine
/// provides one isolation behavior per concurrency mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    /// Read only committed data
    ReadCommitted,
    /// Stable re-reads within the transaction
    RepeatableRead,
    /// Full serializability
    Serializable,
}

/// Per-transaction configuration from the host
///
/// Both fields are accepted and ignored; see the field docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Requested isolation; the engine's mode decides the real behavior
    pub isolation: Option<IsolationLevel>,
    /// Host-assigned commit timestamp; this backend keeps no timestamps
    pub commit_timestamp: Option<u64>,
}

/// Opaque transaction handle handed to store operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTransaction {
    id: TxId,
}

impl StoreTransaction {
    /// The auto-commit pseudo-transaction
    pub fn one_shot() -> Self {
        Self { id: ONE_SHOT_TX }
    }

    /// The engine transaction id behind this handle
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Whether this is the auto-commit handle
    pub fn is_one_shot(&self) -> bool {
        self.id == ONE_SHOT_TX
    }
}

/// Owner of the engine lifecycle and the open-store registry
pub struct StoreManager {
    engine: Arc<Engine>,
    scheme: StorageScheme,
    stores: DashMap<String, Arc<KcvStore>>,
}

impl StoreManager {
    /// Bring the process-wide engine up (or join it) and return a manager
    ///
    /// Idempotent with respect to the engine: if another manager already
    /// initialized it, the existing engine is joined and `config.mode` is
    /// ignored.
    pub fn open(config: StoreManagerConfig) -> Self {
        let engine = trellis_engine::initialize(EngineConfig::with_mode(config.mode));
        info!(scheme = %config.scheme, mode = %engine.mode(), "store manager opened");
        Self::with_engine(engine, config.scheme)
    }

    /// Build a manager over an explicit engine, leaving the process-wide
    /// slot alone
    pub fn with_engine(engine: Arc<Engine>, scheme: StorageScheme) -> Self {
        Self {
            engine,
            scheme,
            stores: DashMap::new(),
        }
    }

    /// Published capabilities of every store
    pub fn features(&self) -> StoreFeatures {
        FEATURES
    }

    /// The scheme stores are opened with
    pub fn scheme(&self) -> StorageScheme {
        self.scheme
    }

    /// Open (or return the already-open) store `name`
    ///
    /// The backing engine table is `range`-partitioned so ordered rowkey
    /// enumeration works under both schemes.
    pub fn open_store(&self, name: &str) -> Result<Arc<KcvStore>> {
        if let Some(store) = self.stores.get(name) {
            return Ok(Arc::clone(&store));
        }
        match self
            .engine
            .create_table(name, PartitionMethod::Range)
        {
            Ok(_) | Err(Error::TableExists { .. }) => {}
            Err(e) => return Err(e),
        }
        let store = Arc::new(KcvStore::new(
            Arc::clone(&self.engine),
            name,
            self.scheme,
        ));
        self.stores.insert(name.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Names of currently open stores
    pub fn store_names(&self) -> Vec<String> {
        self.stores.iter().map(|e| e.key().clone()).collect()
    }

    /// Begin a transaction; the config is accepted and ignored
    pub fn begin_transaction(&self, _config: TransactionConfig) -> Result<StoreTransaction> {
        let id = self.engine.begin_transaction()?;
        Ok(StoreTransaction { id })
    }

    /// Commit a transaction handle
    ///
    /// Committing the one-shot handle is a no-op: its operations were
    /// already applied.
    pub fn commit(&self, tx: StoreTransaction) -> Result<()> {
        if tx.is_one_shot() {
            return Ok(());
        }
        self.engine.commit(tx.id)
    }

    /// Roll a transaction handle back
    pub fn rollback(&self, tx: StoreTransaction) -> Result<()> {
        if tx.is_one_shot() {
            return Ok(());
        }
        self.engine.rollback(tx.id)
    }

    /// Empty every open store, keeping tables and stores registered
    pub fn clear(&self) {
        self.engine.clear_all();
    }

    /// Shut the process-wide engine down, discarding all data
    ///
    /// Returns `false` when the engine was not running (for example when
    /// this manager was built over an explicit engine and the slot was
    /// never initialized).
    pub fn close(self) -> bool {
        info!("store manager closed");
        trellis_engine::shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(mode: CcMode, scheme: StorageScheme) -> StoreManager {
        let engine = Arc::new(Engine::new(EngineConfig::with_mode(mode)));
        StoreManager::with_engine(engine, scheme)
    }

    #[test]
    fn test_open_store_registry() {
        let manager = manager(CcMode::TwoPhase, StorageScheme::CompositeKey);
        let a = manager.open_store("edgestore").unwrap();
        let again = manager.open_store("edgestore").unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(manager.store_names(), vec!["edgestore".to_string()]);
    }

    #[test]
    fn test_transaction_handles() {
        let manager = manager(CcMode::TwoPhase, StorageScheme::CompositeKey);
        let store = manager.open_store("s").unwrap();

        let tx = manager.begin_transaction(TransactionConfig::default()).unwrap();
        store
            .mutate(b"r", &[(b"c".to_vec(), b"v".to_vec())], &[], &tx)
            .unwrap();
        manager.commit(tx).unwrap();

        let read = StoreTransaction::one_shot();
        assert_eq!(store.get(b"r", b"c", &read).unwrap(), b"v");

        // A dead handle is refused.
        assert!(matches!(
            manager.commit(tx),
            Err(Error::TxNotFound { .. })
        ));
    }

    #[test]
    fn test_transaction_config_is_accepted_and_ignored() {
        let manager = manager(CcMode::Optimistic, StorageScheme::SerializedColumns);
        let config = TransactionConfig {
            isolation: Some(IsolationLevel::Serializable),
            commit_timestamp: Some(123_456),
        };
        let tx = manager.begin_transaction(config).unwrap();
        manager.rollback(tx).unwrap();
    }

    #[test]
    fn test_one_shot_commit_is_noop() {
        let manager = manager(CcMode::TwoPhase, StorageScheme::CompositeKey);
        manager.commit(StoreTransaction::one_shot()).unwrap();
        manager.rollback(StoreTransaction::one_shot()).unwrap();
    }

    #[test]
    fn test_clear_empties_stores() {
        let manager = manager(CcMode::Serial, StorageScheme::CompositeKey);
        let store = manager.open_store("s").unwrap();
        let tx = StoreTransaction::one_shot();
        store
            .mutate(b"r", &[(b"c".to_vec(), b"v".to_vec())], &[], &tx)
            .unwrap();
        manager.clear();
        assert!(!store.contains_key(b"r", &tx).unwrap());
        // The store stays open and usable.
        store
            .mutate(b"r", &[(b"c".to_vec(), b"v2".to_vec())], &[], &tx)
            .unwrap();
        assert_eq!(store.get(b"r", b"c", &tx).unwrap(), b"v2");
    }

    // The process-wide lifecycle gets exactly one test in this binary;
    // parallel tests sharing the global slot would interfere.
    #[test]
    fn test_open_close_lifecycle() {
        let manager = StoreManager::open(StoreManagerConfig {
            mode: CcMode::TwoPhase,
            scheme: StorageScheme::CompositeKey,
        });
        let store = manager.open_store("lifecycle").unwrap();
        let tx = manager.begin_transaction(TransactionConfig::default()).unwrap();
        store
            .mutate(b"r", &[(b"c".to_vec(), b"v".to_vec())], &[], &tx)
            .unwrap();
        manager.commit(tx).unwrap();
        assert!(manager.close());
        assert!(matches!(
            trellis_engine::handle(),
            Err(Error::NotInitialized)
        ));
    }
}
