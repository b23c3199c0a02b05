//! TableSet: the catalog plus every table's storage map
//!
//! This is the unit of state the concurrency strategies operate on. The
//! engine facade owns exactly one TableSet behind its global mutex and
//! passes it down by mutable reference, so no locking happens here.

use crate::catalog::{TableCatalog, TableHandle};
use crate::table::TableStore;
use rustc_hash::FxHashMap;
use trellis_core::{Error, PartitionMethod, Result, TableId};

/// Catalog and storage maps for every table in the engine
#[derive(Debug, Default)]
pub struct TableSet {
    catalog: TableCatalog,
    tables: FxHashMap<TableId, TableStore>,
}

impl TableSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            catalog: TableCatalog::new(),
            tables: FxHashMap::default(),
        }
    }

    /// Register a table and allocate its storage map
    pub fn create_table(&mut self, name: &str, partition: PartitionMethod) -> Result<TableId> {
        let handle = self.catalog.create(name, partition)?;
        self.tables.insert(handle.id, TableStore::new());
        Ok(handle.id)
    }

    /// Resolve a table name without touching its store
    pub fn resolve(&self, name: &str) -> Result<TableHandle> {
        self.catalog.resolve(name)
    }

    /// Shared access to a table's store by name
    pub fn store(&self, name: &str) -> Result<(TableHandle, &TableStore)> {
        let handle = self.catalog.resolve(name)?;
        let store = self
            .tables
            .get(&handle.id)
            .ok_or_else(|| Error::unknown("cataloged table has no storage map"))?;
        Ok((handle, store))
    }

    /// Mutable access to a table's store by name
    pub fn store_mut(&mut self, name: &str) -> Result<(TableHandle, &mut TableStore)> {
        let handle = self.catalog.resolve(name)?;
        let store = self
            .tables
            .get_mut(&handle.id)
            .ok_or_else(|| Error::unknown("cataloged table has no storage map"))?;
        Ok((handle, store))
    }

    /// Number of registered tables
    pub fn table_count(&self) -> usize {
        self.catalog.len()
    }

    /// Empty every table while keeping the catalog intact
    pub fn clear_all(&mut self) {
        for store in self.tables.values_mut() {
            store.clear();
        }
    }
}
