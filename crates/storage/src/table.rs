//! Table handle passed to transaction work.

use crate::collection::{Collection, WhereClause};
use crate::table_store::TableStore;
use crate::transaction::{Transaction, TransactionMode};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::schema::TableSchema;
use ripple_core::{Error, Record, Result, Value};

/// A table opened inside a transaction.
///
/// The handle is consumed by the query builder methods (`where_`, `filter`,
/// `order_by`, `to_collection`); use [`Table::reborrow`] to keep it around.
pub struct Table<'t> {
    store: &'t mut TableStore,
    tx: &'t mut Transaction,
}

impl<'t> Table<'t> {
    pub(crate) fn new(store: &'t mut TableStore, tx: &'t mut Transaction) -> Self {
        Self { store, tx }
    }

    /// Returns a shorter-lived handle to the same table.
    pub fn reborrow(&mut self) -> Table<'_> {
        Table {
            store: &mut *self.store,
            tx: &mut *self.tx,
        }
    }

    /// Returns the table schema.
    pub fn schema(&self) -> &TableSchema {
        self.store.schema()
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// Returns the transaction mode.
    pub fn mode(&self) -> TransactionMode {
        self.tx.mode()
    }

    pub(crate) fn store(&self) -> &TableStore {
        self.store
    }

    /// Starts a where-clause on `field`.
    pub fn where_(self, field: impl Into<String>) -> WhereClause<'t> {
        Collection::new(self).where_(field)
    }

    /// Returns a collection over every record in primary-key order.
    pub fn to_collection(self) -> Collection<'t> {
        Collection::new(self)
    }

    /// Returns a collection of the records accepted by `predicate`.
    pub fn filter(self, predicate: impl Fn(&Record) -> bool + 't) -> Collection<'t> {
        Collection::new(self).filter(predicate)
    }

    /// Returns a collection ordered by the index on `field`.
    pub fn order_by(self, field: &str) -> Result<Collection<'t>> {
        if !self.schema().is_indexed(field) {
            return Err(Error::invalid_operation(format!(
                "Field {} is not indexed in table {}",
                field,
                self.name()
            )));
        }
        Ok(Collection::ordered_by(self, field.into()))
    }

    /// Returns the number of records in the table.
    pub fn count(&self) -> usize {
        self.store.len()
    }

    /// Gets a record by primary key.
    pub fn get(&self, key: &Value) -> Option<Record> {
        self.store.get(key).cloned()
    }

    /// Inserts or replaces a record, returning its key.
    ///
    /// Without an explicit `key` the primary key is read from the record, or allocated
    /// for auto-increment tables.
    pub fn put(&mut self, record: Record, key: Option<Value>) -> Result<Value> {
        self.tx.put(&mut *self.store, record, key)
    }

    /// Puts every record, returning the key of the last one (`Null` when empty).
    pub fn bulk_put(&mut self, records: Vec<Record>) -> Result<Value> {
        let mut last = Value::Null;
        for record in records {
            last = self.put(record, None)?;
        }
        Ok(last)
    }

    /// Deletes a record by key. Returns false if nothing was stored under it.
    pub fn delete(&mut self, key: &Value) -> Result<bool> {
        self.tx.delete(&mut *self.store, key)
    }

    /// Deletes every record, returning how many were removed.
    pub fn clear(&mut self) -> Result<usize> {
        let keys: Vec<Value> = self.store.scan().map(|(k, _)| k.clone()).collect();
        let mut removed = 0;
        for key in keys {
            if self.delete(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TableCache;
    use ripple_core::record;

    fn with_table<T>(mode: TransactionMode, work: impl FnOnce(Table<'_>) -> T) -> T {
        let mut cache = TableCache::new();
        cache
            .create_table(TableSchema::parse("friends", "++id,age").unwrap())
            .unwrap();
        let store = cache.get_table_mut("friends").unwrap();
        let mut tx = Transaction::begin("friends", mode);
        work(Table::new(store, &mut tx))
    }

    #[test]
    fn test_table_put_get_delete() {
        with_table(TransactionMode::ReadWrite, |mut table| {
            let key = table.put(record! { "age" => 30 }, None).unwrap();
            assert_eq!(table.get(&key), Some(record! { "id" => 1, "age" => 30 }));
            assert_eq!(table.count(), 1);
            assert!(table.delete(&key).unwrap());
            assert!(!table.delete(&key).unwrap());
            assert_eq!(table.count(), 0);
        });
    }

    #[test]
    fn test_table_bulk_put_returns_last_key() {
        with_table(TransactionMode::ReadWrite, |mut table| {
            let last = table
                .bulk_put(alloc::vec![record! { "id" => 5 }, record! { "id" => 2 }])
                .unwrap();
            assert_eq!(last, Value::Int64(2));
            assert_eq!(table.bulk_put(Vec::new()).unwrap(), Value::Null);
            assert_eq!(table.clear().unwrap(), 2);
        });
    }

    #[test]
    fn test_table_read_only() {
        with_table(TransactionMode::ReadOnly, |mut table| {
            assert_eq!(table.mode(), TransactionMode::ReadOnly);
            assert!(matches!(
                table.put(record! { "age" => 1 }, None),
                Err(Error::ReadOnlyTransaction { .. })
            ));
        });
    }

    #[test]
    fn test_table_order_by_requires_index() {
        with_table(TransactionMode::ReadOnly, |mut table| {
            assert!(table.reborrow().order_by("age").is_ok());
            assert!(table.reborrow().order_by("id").is_ok());
            assert!(table.order_by("name").is_err());
        });
    }
}
