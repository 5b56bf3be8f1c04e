//! Record storage for Ripple.
//!
//! This module provides the `TableStore` struct which holds the records of a single
//! table keyed by primary key, and serves primary-key and index-ordered scans.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use ripple_core::schema::TableSchema;
use ripple_core::{Error, Record, Result, Value};

/// Records of one table, ordered by primary key.
#[derive(Clone, Debug)]
pub struct TableStore {
    schema: TableSchema,
    rows: BTreeMap<Value, Record>,
    /// Next key handed out for auto-increment tables.
    next_auto_key: i64,
}

impl TableStore {
    /// Creates an empty store for `schema`.
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_auto_key: 1,
        }
    }

    /// Returns the table schema.
    #[inline]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Returns the number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table holds no records.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Gets a record by primary key.
    pub fn get(&self, key: &Value) -> Option<&Record> {
        self.rows.get(key)
    }

    /// Returns true if a record exists under `key`.
    pub fn contains(&self, key: &Value) -> bool {
        self.rows.contains_key(key)
    }

    /// Resolves the key a record will be stored under.
    ///
    /// An explicit key wins and is written into the record; otherwise the primary key
    /// field is read; otherwise an auto-increment table allocates the next key.
    fn resolve_key(&mut self, record: &mut Record, key: Option<Value>) -> Result<Value> {
        let pk = self.schema.primary_key();
        let key = match key {
            Some(key) if !key.is_null() => {
                if !pk.contains('.') {
                    record.set(pk, key.clone());
                }
                key
            }
            _ => match record.get_path(pk) {
                Some(existing) if !existing.is_null() => existing.clone(),
                _ if self.schema.auto_increment() => {
                    let key = Value::Int64(self.next_auto_key);
                    if !pk.contains('.') {
                        record.set(pk, key.clone());
                    }
                    key
                }
                _ => return Err(Error::missing_key(self.schema.name())),
            },
        };

        if let Value::Int64(n) = key {
            if n >= self.next_auto_key {
                self.next_auto_key = n.saturating_add(1);
            }
        }
        Ok(key)
    }

    /// Inserts or replaces a record, returning its key and the replaced record.
    pub fn put(
        &mut self,
        mut record: Record,
        key: Option<Value>,
    ) -> Result<(Value, Option<Record>)> {
        let key = self.resolve_key(&mut record, key)?;
        let old = self.rows.insert(key.clone(), record);
        Ok((key, old))
    }

    /// Deletes a record by primary key.
    pub fn delete(&mut self, key: &Value) -> Option<Record> {
        self.rows.remove(key)
    }

    /// Puts back a previous state of `key` (used by rollback).
    pub fn restore(&mut self, key: Value, record: Option<Record>) {
        match record {
            Some(record) => {
                self.rows.insert(key, record);
            }
            None => {
                self.rows.remove(&key);
            }
        }
    }

    /// Iterates records in primary-key order.
    pub fn scan(&self) -> impl DoubleEndedIterator<Item = (&Value, &Record)> + '_ {
        self.rows.iter()
    }

    /// Returns records ordered by `field`, then by primary key.
    ///
    /// Records without a value for `field` are not part of the index and are skipped.
    pub fn scan_by(&self, field: &str) -> Vec<(&Value, &Record)> {
        if field == self.schema.primary_key() {
            return self.rows.iter().collect();
        }
        let mut entries: Vec<(&Value, &Value, &Record)> = self
            .rows
            .iter()
            .filter_map(|(key, record)| match record.get_path(field) {
                Some(v) if !v.is_null() => Some((v, key, record)),
                _ => None,
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(b.1)));
        entries.into_iter().map(|(_, key, record)| (key, record)).collect()
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
