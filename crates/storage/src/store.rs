//! The store: a named, versioned set of tables with transactional access.

use crate::cache::TableCache;
use crate::feed::ChangeFeed;
use crate::table::Table;
use crate::transaction::{Transaction, TransactionMode};
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use ripple_core::schema::StoreSchema;
use ripple_core::{Error, Result};
use tracing::{debug, trace};

/// An in-memory store.
///
/// Tables are created by the first successful [`Store::open`]. Closing keeps the data,
/// so a later open resumes where the store left off.
pub struct Store {
    name: String,
    schema: StoreSchema,
    cache: TableCache,
    open: bool,
    created: bool,
    /// Set while another connection blocks opening.
    blocked: Option<String>,
    feed: Rc<ChangeFeed>,
}

impl Store {
    /// Creates a closed store.
    pub fn new(name: impl Into<String>, schema: StoreSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            cache: TableCache::new(),
            open: false,
            created: false,
            blocked: None,
            feed: Rc::new(ChangeFeed::new()),
        }
    }

    /// Returns the store name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared schema.
    pub fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    /// Returns the commit-notification stream.
    pub fn feed(&self) -> Rc<ChangeFeed> {
        self.feed.clone()
    }

    /// Returns true if the store is open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns the names of the created tables.
    pub fn table_names(&self) -> Vec<&str> {
        self.cache.table_names()
    }

    /// Opens the store, creating its tables on first use.
    pub fn open(&mut self) -> Result<()> {
        if self.open {
            return Ok(());
        }
        if let Some(reason) = &self.blocked {
            return Err(Error::store_not_openable(reason.as_str()));
        }
        if !self.created {
            self.schema
                .validate()
                .map_err(|e| Error::store_not_openable(e.to_string()))?;
            for table in self.schema.tables() {
                self.cache
                    .create_table(table.clone())
                    .map_err(|e| Error::store_not_openable(e.to_string()))?;
            }
            self.created = true;
        }
        self.open = true;
        debug!(store = %self.name, version = self.schema.version(), "store opened");
        Ok(())
    }

    /// Closes the store. Data stays in memory.
    pub fn close(&mut self) {
        if self.open {
            self.open = false;
            debug!(store = %self.name, "store closed");
        }
    }

    /// Makes every following open fail with `reason`, as when an upgrade is blocked
    /// by another connection. Passing `None` lifts the block.
    pub fn block(&mut self, reason: Option<String>) {
        self.blocked = reason;
    }

    /// Runs `work` against `table` inside a transaction.
    ///
    /// If `work` fails every write it made is rolled back. Otherwise the transaction
    /// commits and its changes are queued on the feed.
    pub fn transaction<T, F>(&mut self, mode: TransactionMode, table: &str, work: F) -> Result<T>
    where
        F: FnOnce(Table<'_>) -> Result<T>,
    {
        if !self.open {
            return Err(Error::StoreClosed);
        }
        let store = self
            .cache
            .get_table_mut(table)
            .ok_or_else(|| Error::table_not_found(table))?;

        let mut tx = Transaction::begin(table, mode);
        trace!(id = tx.id(), table, ?mode, "transaction started");

        match work(Table::new(store, &mut tx)) {
            Ok(value) => {
                let id = tx.id();
                let changes = tx.commit()?;
                debug!(id, table, changes = changes.len(), "transaction committed");
                self.feed.publish(changes);
                Ok(value)
            }
            Err(err) => {
                debug!(id = tx.id(), table, error = %err, "transaction rolled back");
                tx.rollback(&mut self.cache)?;
                Err(err)
            }
        }
    }
}
