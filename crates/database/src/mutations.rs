//! One-shot reads and writes.
//!
//! Each operation runs in its own transaction on a fresh executor and returns a
//! [`Pending`] handle that settles when the task queue runs.

use crate::database::Database;
use ripple_core::{Error, Record, Result, Value};
use ripple_query::{compile, QueryDescriptor, QueryResult};
use ripple_storage::{Table, TransactionMode};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

/// The eventual outcome of a one-shot operation.
pub struct Pending<T> {
    slot: Rc<RefCell<Option<Result<T>>>>,
}

impl<T> Pending<T> {
    fn new() -> Self {
        Self {
            slot: Rc::new(RefCell::new(None)),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Takes the outcome out, if settled.
    pub fn take(&self) -> Option<Result<T>> {
        self.slot.borrow_mut().take()
    }

    /// Drains the task queue of `db` until this operation settles and returns its outcome.
    ///
    /// Unhandled failures of other queued units do not stop the drain; they are
    /// logged and the drain continues.
    pub fn resolve(self, db: &Database) -> Result<T> {
        loop {
            if let Some(outcome) = self.take() {
                return outcome;
            }
            match db.run_pending() {
                Ok(_) => {
                    let unsettled = || Err(Error::invalid_operation("operation did not settle"));
                    return self.take().unwrap_or_else(unsettled);
                }
                Err(err) => warn!(error = %err, "queued unit failed while resolving an operation"),
            }
        }
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// New contents for the record matched by [`Database::update_by_query`].
pub enum Update {
    /// Replaces the record.
    Replace(Record),
    /// Computes the new record from the current one. An error rolls the
    /// transaction back.
    Modify(Box<dyn FnOnce(Record) -> Result<Record>>),
}

impl Update {
    pub fn with(f: impl FnOnce(Record) -> Record + 'static) -> Self {
        Update::Modify(Box::new(move |current: Record| -> Result<Record> { Ok(f(current)) }))
    }

    pub fn try_with(f: impl FnOnce(Record) -> Result<Record> + 'static) -> Self {
        Update::Modify(Box::new(f))
    }

    fn apply(self, current: Record) -> Result<Record> {
        match self {
            Update::Replace(record) => Ok(record),
            Update::Modify(f) => f(current),
        }
    }
}

impl From<Record> for Update {
    fn from(record: Record) -> Self {
        Update::Replace(record)
    }
}

/// Narrows a descriptor to the primary key of its first match.
fn first_key_query(mut descriptor: QueryDescriptor) -> QueryDescriptor {
    descriptor.count = false;
    descriptor.erase = false;
    descriptor.primary_keys = true;
    descriptor.limit = Some(1);
    descriptor
}

fn first_key(table: Table<'_>, descriptor: &QueryDescriptor) -> Result<Option<Value>> {
    Ok(compile(table, descriptor)?
        .keys()
        .and_then(|keys| keys.first().cloned()))
}

impl Database {
    fn submit<T: 'static>(
        &self,
        table: &str,
        mode: TransactionMode,
        work: impl FnOnce(Table<'_>) -> Result<T> + 'static,
    ) -> Pending<T> {
        let pending = Pending::new();
        let ok = pending.slot.clone();
        let err = pending.slot.clone();
        self.executor().run(
            table,
            mode,
            work,
            move |value| *ok.borrow_mut() = Some(Ok(value)),
            Some(Box::new(move |e: Error| *err.borrow_mut() = Some(Err(e)))),
        );
        pending
    }

    /// Writes `record`, returning its primary key.
    pub fn put(&self, table: &str, record: Record) -> Pending<Value> {
        self.submit(table, TransactionMode::ReadWrite, move |mut t| t.put(record, None))
    }

    /// Writes `records`, returning the key of the last one.
    pub fn bulk_put(&self, table: &str, records: Vec<Record>) -> Pending<Value> {
        self.submit(table, TransactionMode::ReadWrite, move |mut t| t.bulk_put(records))
    }

    /// Deletes the record stored under `key`.
    pub fn delete(&self, table: &str, key: impl Into<Value>) -> Pending<()> {
        let key = key.into();
        self.submit(table, TransactionMode::ReadWrite, move |mut t| {
            t.delete(&key).map(|_| ())
        })
    }

    /// Deletes the records matched by `descriptor`.
    pub fn delete_by_query(
        &self,
        table: &str,
        descriptor: QueryDescriptor,
    ) -> Pending<QueryResult> {
        let descriptor = descriptor.erase();
        self.submit(table, TransactionMode::ReadWrite, move |t| compile(t, &descriptor))
    }

    /// Rewrites the first record matched by `descriptor` under its own key.
    ///
    /// Settles with the key written, or `None` when nothing matched.
    pub fn update_by_query(
        &self,
        table: &str,
        descriptor: QueryDescriptor,
        update: impl Into<Update>,
    ) -> Pending<Option<Value>> {
        let update = update.into();
        let descriptor = first_key_query(descriptor);
        self.submit(table, TransactionMode::ReadWrite, move |mut t| {
            let Some(key) = first_key(t.reborrow(), &descriptor)? else {
                return Ok(None);
            };
            let Some(current) = t.get(&key) else {
                return Ok(None);
            };
            t.put(update.apply(current)?, Some(key.clone()))?;
            Ok(Some(key))
        })
    }

    /// Returns the primary key of the first record matched by `descriptor`.
    pub fn first_key(&self, table: &str, descriptor: QueryDescriptor) -> Pending<Option<Value>> {
        let descriptor = first_key_query(descriptor);
        self.submit(table, TransactionMode::ReadOnly, move |t| first_key(t, &descriptor))
    }

    /// Runs `descriptor` once.
    pub fn query(&self, table: &str, descriptor: QueryDescriptor) -> Pending<QueryResult> {
        let mode = if descriptor.is_write() {
            TransactionMode::ReadWrite
        } else {
            TransactionMode::ReadOnly
        };
        self.submit(table, mode, move |t| compile(t, &descriptor))
    }
}
