//! Store definition: a versioned set of table schemas.

use super::table::TableSchema;
use crate::error::{Error, Result};
use alloc::format;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// The declared shape of a store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSchema {
    version: u32,
    tables: Vec<TableSchema>,
}

impl StoreSchema {
    /// Creates an empty schema at `version`.
    pub fn new(version: u32) -> Self {
        Self {
            version,
            tables: Vec::new(),
        }
    }

    /// Adds a table declaration.
    pub fn table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    /// Parses and adds a compact table declaration (see [`TableSchema::parse`]).
    pub fn declare(self, name: &str, declaration: &str) -> Result<Self> {
        Ok(self.table(TableSchema::parse(name, declaration)?))
    }

    /// Returns the schema version.
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the declared tables.
    #[inline]
    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    /// Gets a table declaration by name.
    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Checks the declaration is usable: a positive version and unique table names.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 {
            return Err(Error::invalid_schema("Schema version must be positive"));
        }
        for (i, table) in self.tables.iter().enumerate() {
            if self.tables[..i].iter().any(|t| t.name() == table.name()) {
                return Err(Error::invalid_schema(format!(
                    "Table declared twice: {}",
                    table.name()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_schema_declare() {
        let schema = StoreSchema::new(1)
            .declare("friends", "++id,name")
            .unwrap()
            .declare("settings", "key")
            .unwrap();

        assert_eq!(schema.version(), 1);
        assert_eq!(schema.tables().len(), 2);
        assert_eq!(schema.get_table("settings").unwrap().primary_key(), "key");
        assert!(schema.get_table("missing").is_none());
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_store_schema_rejects_duplicates() {
        let schema = StoreSchema::new(1)
            .declare("friends", "++id")
            .unwrap()
            .declare("friends", "id")
            .unwrap();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_store_schema_rejects_zero_version() {
        assert!(StoreSchema::new(0).validate().is_err());
    }
}
