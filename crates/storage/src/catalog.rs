//! Table catalog: name to id resolution and partition bookkeeping
//!
//! The catalog is the authority on which tables exist. Ids are handed out
//! monotonically from 1 and a table, once created, lives for the life of
//! the engine. Lookup by name is O(1).

use rustc_hash::FxHashMap;
use trellis_core::{Error, PartitionMethod, Result, TableId};

/// Catalog record for one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableHandle {
    /// Catalog-assigned id
    pub id: TableId,
    /// Advisory partition method
    pub partition: PartitionMethod,
}

/// Name-keyed table catalog
#[derive(Debug, Default)]
pub struct TableCatalog {
    by_name: FxHashMap<String, TableHandle>,
    next_id: Option<TableId>,
}

impl TableCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            by_name: FxHashMap::default(),
            next_id: None,
        }
    }

    /// Register a table and assign the next id
    ///
    /// Table names must be non-empty and free of the `0x00` separator so
    /// they can be embedded in flattened transaction-state keys. A duplicate
    /// name fails with `TableExists`.
    pub fn create(&mut self, name: &str, partition: PartitionMethod) -> Result<TableHandle> {
        if name.is_empty() {
            return Err(Error::invalid_argument("table name must not be empty"));
        }
        if name.as_bytes().contains(&0u8) {
            return Err(Error::invalid_argument(
                "table name must not contain the 0x00 separator",
            ));
        }
        if self.by_name.contains_key(name) {
            return Err(Error::table_exists(name));
        }

        let id = match self.next_id {
            None => TableId::first(),
            Some(last) => last.next(),
        };
        self.next_id = Some(id);

        let handle = TableHandle { id, partition };
        self.by_name.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Resolve a table name to its handle
    pub fn resolve(&self, name: &str) -> Result<TableHandle> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::table_not_found(name))
    }

    /// Number of registered tables
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
