//! Cache management for Ripple stores.
//!
//! This module provides the `TableCache` struct which manages multiple table stores.

use crate::table_store::TableStore;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use ripple_core::schema::TableSchema;
use ripple_core::{Error, Result};

/// Cache for managing multiple table stores.
#[derive(Debug, Default)]
pub struct TableCache {
    /// Table name → TableStore mapping.
    tables: BTreeMap<String, TableStore>,
}

impl TableCache {
    /// Creates a new empty table cache.
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Creates a table in the cache.
    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(Error::invalid_schema(format!(
                "Table already exists: {}",
                name
            )));
        }
        self.tables.insert(name, TableStore::new(schema));
        Ok(())
    }

    /// Drops a table from the cache.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        if self.tables.remove(name).is_none() {
            return Err(Error::table_not_found(name));
        }
        Ok(())
    }

    /// Gets a reference to a table store.
    pub fn get_table(&self, name: &str) -> Option<&TableStore> {
        self.tables.get(name)
    }

    /// Gets a mutable reference to a table store.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut TableStore> {
        self.tables.get_mut(name)
    }

    /// Returns the number of tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Returns all table names.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    /// Returns true if the table exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns the total record count across all tables.
    pub fn total_record_count(&self) -> usize {
        self.tables.values().map(|t| t.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::record;

    #[test]
    fn test_cache_create_table() {
        let mut cache = TableCache::new();
        cache
            .create_table(TableSchema::parse("friends", "++id").unwrap())
            .unwrap();

        assert!(cache.has_table("friends"));
        assert_eq!(cache.table_count(), 1);
        assert_eq!(cache.table_names(), alloc::vec!["friends"]);
    }

    #[test]
    fn test_cache_duplicate_table() {
        let mut cache = TableCache::new();
        let schema = TableSchema::parse("friends", "++id").unwrap();
        cache.create_table(schema.clone()).unwrap();
        assert!(cache.create_table(schema).is_err());
    }

    #[test]
    fn test_cache_drop_table() {
        let mut cache = TableCache::new();
        cache
            .create_table(TableSchema::parse("friends", "++id").unwrap())
            .unwrap();
        cache.drop_table("friends").unwrap();
        assert!(!cache.has_table("friends"));
        assert_eq!(cache.drop_table("friends"), Err(Error::table_not_found("friends")));
    }

    #[test]
    fn test_cache_total_record_count() {
        let mut cache = TableCache::new();
        cache.create_table(TableSchema::parse("a", "id").unwrap()).unwrap();
        cache.create_table(TableSchema::parse("b", "id").unwrap()).unwrap();
        cache.get_table_mut("a").unwrap().put(record! { "id" => 1 }, None).unwrap();
        cache.get_table_mut("b").unwrap().put(record! { "id" => 1 }, None).unwrap();
        cache.get_table_mut("b").unwrap().put(record! { "id" => 2 }, None).unwrap();
        assert_eq!(cache.total_record_count(), 3);
    }
}
