//! Transaction management for Ripple stores.
//!
//! A transaction is scoped to a single table and runs in one of two modes. Writes are
//! applied to the table store immediately and journaled, so a rollback can restore the
//! previous state.

use crate::cache::TableCache;
use crate::journal::{ChangeRecord, Journal};
use crate::table_store::TableStore;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use ripple_core::{Error, Record, Result, Value};

/// Global transaction ID counter.
static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction ID type.
pub type TransactionId = u64;

/// Access mode of a transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    /// Reads only; any write fails.
    #[default]
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// A store transaction over one table.
#[derive(Debug)]
pub struct Transaction {
    /// Unique transaction ID.
    id: TransactionId,
    /// Table the transaction is scoped to.
    table: String,
    mode: TransactionMode,
    /// Journal for tracking changes.
    journal: Journal,
    /// Current state.
    state: TransactionState,
}

impl Transaction {
    /// Creates a new transaction.
    pub fn begin(table: impl Into<String>, mode: TransactionMode) -> Self {
        Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::SeqCst),
            table: table.into(),
            mode,
            journal: Journal::new(),
            state: TransactionState::Active,
        }
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the table this transaction is scoped to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the access mode.
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true if the transaction is active.
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    fn check_writable(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::invalid_operation("Transaction is not active"));
        }
        if self.mode == TransactionMode::ReadOnly {
            return Err(Error::read_only(self.table.as_str()));
        }
        Ok(())
    }

    /// Puts a record within this transaction, returning its key.
    pub fn put(
        &mut self,
        store: &mut TableStore,
        record: Record,
        key: Option<Value>,
    ) -> Result<Value> {
        self.check_writable()?;
        let (key, old) = store.put(record, key)?;
        // The stored record now carries the resolved key
        let obj = store.get(&key).cloned().unwrap_or_default();
        self.journal.record_put(store.name(), key.clone(), obj, old);
        Ok(key)
    }

    /// Deletes a record within this transaction. Returns false if nothing was stored
    /// under `key`.
    pub fn delete(&mut self, store: &mut TableStore, key: &Value) -> Result<bool> {
        self.check_writable()?;
        match store.delete(key) {
            Some(old) => {
                self.journal.record_delete(store.name(), key.clone(), old);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Commits the transaction, returning its changes in write order.
    pub fn commit(mut self) -> Result<Vec<ChangeRecord>> {
        if !self.is_active() {
            return Err(Error::invalid_operation("Transaction is not active"));
        }
        self.state = TransactionState::Committed;
        Ok(self.journal.commit())
    }

    /// Rolls back the transaction.
    pub fn rollback(mut self, cache: &mut TableCache) -> Result<()> {
        if !self.is_active() {
            return Err(Error::invalid_operation("Transaction is not active"));
        }
        self.state = TransactionState::RolledBack;
        self.journal.rollback(cache);
        Ok(())
    }

    /// Returns the changes recorded so far.
    pub fn changes(&self) -> &[ChangeRecord] {
        self.journal.entries()
    }
}
