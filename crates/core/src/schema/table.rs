//! Table definition for Ripple schemas.

use crate::error::{Error, Result};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// A table definition: its name, primary key and secondary index fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    name: String,
    /// Primary key field (dotted paths allowed).
    primary_key: String,
    /// Whether missing primary keys are allocated by the store.
    auto_increment: bool,
    /// Secondary index fields, in declaration order.
    indexes: Vec<String>,
}

impl TableSchema {
    /// Parses a compact declaration such as `"++id, name, age"`.
    ///
    /// The first entry is the primary key (`++` marks auto-increment); the rest are
    /// index fields. Uniqueness (`&`) and multi-entry (`*`) markers are accepted and
    /// ignored.
    pub fn parse(name: impl Into<String>, declaration: &str) -> Result<Self> {
        let mut entries = declaration
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty());

        let primary = entries
            .next()
            .ok_or_else(|| Error::invalid_schema("Declaration has no primary key"))?;
        let (primary, auto_increment) = match primary.strip_prefix("++") {
            Some(rest) => (rest, true),
            None => (primary, false),
        };

        let mut builder = TableBuilder::new(name)?.primary_key(primary, auto_increment)?;
        for entry in entries {
            builder = builder.index(entry.trim_start_matches(['&', '*']))?;
        }
        builder.build()
    }

    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the primary key field.
    #[inline]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Returns whether the primary key auto-increments.
    #[inline]
    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Returns the secondary index fields.
    #[inline]
    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    /// Returns true if `field` is the primary key or a declared index.
    pub fn is_indexed(&self, field: &str) -> bool {
        self.primary_key == field || self.indexes.iter().any(|i| i == field)
    }
}

/// Builder for creating table definitions.
pub struct TableBuilder {
    name: String,
    primary_key: Option<(String, bool)>,
    indexes: Vec<String>,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::check_naming_rules(&name)?;
        Ok(Self {
            name,
            primary_key: None,
            indexes: Vec::new(),
        })
    }

    /// Validates a name follows naming rules.
    fn check_naming_rules(name: &str) -> Result<()> {
        let Some(first) = name.chars().next() else {
            return Err(Error::invalid_schema("Name cannot be empty"));
        };
        if !first.is_ascii_alphabetic() && first != '_' && first != '$' {
            return Err(Error::invalid_schema(format!(
                "Name must start with letter, underscore or $: {}",
                name
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
        {
            return Err(Error::invalid_schema(format!(
                "Name contains invalid characters: {}",
                name
            )));
        }
        Ok(())
    }

    /// Sets the primary key field.
    pub fn primary_key(mut self, field: &str, auto_increment: bool) -> Result<Self> {
        Self::check_naming_rules(field)?;
        if self.primary_key.is_some() {
            return Err(Error::invalid_schema(format!(
                "Primary key already declared for table: {}",
                self.name
            )));
        }
        self.primary_key = Some((field.to_string(), auto_increment));
        Ok(self)
    }

    /// Adds a secondary index field.
    pub fn index(mut self, field: &str) -> Result<Self> {
        Self::check_naming_rules(field)?;
        let duplicate = self.indexes.iter().any(|i| i == field)
            || matches!(&self.primary_key, Some((pk, _)) if pk == field);
        if duplicate {
            return Err(Error::invalid_schema(format!("Index already exists: {}", field)));
        }
        self.indexes.push(field.to_string());
        Ok(self)
    }

    /// Builds the table definition.
    pub fn build(self) -> Result<TableSchema> {
        let (primary_key, auto_increment) = self.primary_key.ok_or_else(|| {
            Error::invalid_schema(format!("Table has no primary key: {}", self.name))
        })?;
        Ok(TableSchema {
            name: self.name,
            primary_key,
            auto_increment,
            indexes: self.indexes,
        })
    }
}
