//! Transaction executor.
//!
//! An executor runs one unit of work at a time against one table. Units are
//! queued on the engine's task queue; while a unit is outstanding every further
//! request on the same executor is rejected, not queued.

use crate::database::Engine;
use ripple_core::{Error, Result};
use ripple_storage::{Table, TransactionMode};
use std::cell::Cell;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// Outcome of a request to run a unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    /// The unit was queued and will run when the task queue drains.
    Scheduled,
    /// The executor already has an outstanding unit; nothing was queued.
    BusyRejected,
}

impl Submission {
    pub fn is_scheduled(self) -> bool {
        self == Submission::Scheduled
    }
}

/// Handler receiving the failure of a unit.
pub type ErrorHandler = Box<dyn FnOnce(Error)>;

type Work<T> = Box<dyn FnOnce(Table<'_>) -> Result<T>>;

/// A unit of work bound to a table and a transaction mode.
pub struct WorkUnit<T> {
    table: String,
    mode: TransactionMode,
    work: Work<T>,
}

impl<T> WorkUnit<T> {
    pub fn new(
        table: impl Into<String>,
        mode: TransactionMode,
        work: impl FnOnce(Table<'_>) -> Result<T> + 'static,
    ) -> Self {
        Self {
            table: table.into(),
            mode,
            work: Box::new(work),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }
}

/// Runs units of work inside transactions, one at a time.
pub struct TransactionExecutor {
    engine: Rc<Engine>,
    busy: Rc<Cell<bool>>,
}

impl TransactionExecutor {
    pub(crate) fn new(engine: Rc<Engine>) -> Self {
        Self {
            engine,
            busy: Rc::new(Cell::new(false)),
        }
    }

    /// Returns true while a unit is queued or running.
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Requests `work` to run against `table`.
    ///
    /// On success `on_success` receives the work's value. A failure is wrapped as
    /// [`Error::TransactionFailed`] and passed to `on_error`; without a handler it is
    /// returned from the task, which stops [`Database::run_pending`](crate::Database::run_pending).
    pub fn run<T: 'static>(
        &self,
        table: impl Into<String>,
        mode: TransactionMode,
        work: impl FnOnce(Table<'_>) -> Result<T> + 'static,
        on_success: impl FnOnce(T) + 'static,
        on_error: Option<ErrorHandler>,
    ) -> Submission {
        let unit = WorkUnit::new(table, mode, work);
        self.run_with(move || Some(unit), on_success, on_error)
    }

    /// Like [`run`](Self::run), but builds the unit when it runs.
    ///
    /// `prepare` sees the state current at execution time, so requests rejected
    /// while this one is queued are covered by it. Returning `None` skips the unit.
    pub fn run_with<T: 'static>(
        &self,
        prepare: impl FnOnce() -> Option<WorkUnit<T>> + 'static,
        on_success: impl FnOnce(T) + 'static,
        on_error: Option<ErrorHandler>,
    ) -> Submission {
        if self.busy.get() {
            debug!("executor busy, request rejected");
            return Submission::BusyRejected;
        }
        self.busy.set(true);

        let busy = self.busy.clone();
        let engine = Rc::downgrade(&self.engine);
        self.engine.queue.push(move || {
            run_unit(&engine, &busy, prepare, on_success, on_error)
        });
        Submission::Scheduled
    }
}

fn run_unit<T>(
    engine: &Weak<Engine>,
    busy: &Cell<bool>,
    prepare: impl FnOnce() -> Option<WorkUnit<T>>,
    on_success: impl FnOnce(T),
    on_error: Option<ErrorHandler>,
) -> Result<()> {
    let unit = match engine.upgrade() {
        Some(engine) => prepare().map(|unit| (engine, unit)),
        None => None,
    };
    let Some((engine, unit)) = unit else {
        busy.set(false);
        return Ok(());
    };
    let WorkUnit { table, mode, work } = unit;

    let monitored = engine.monitor_start();
    let result = transact(&engine, &table, mode, work)
        .map_err(|err| Error::transaction_failed(table.as_str(), err));
    engine.monitor_end(monitored);
    busy.set(false);

    let outcome = match result {
        Ok(value) => {
            on_success(value);
            Ok(())
        }
        Err(err) => match on_error {
            Some(handler) => {
                debug!(table = %table, error = %err, "transaction failed");
                handler(err);
                Ok(())
            }
            None => {
                warn!(table = %table, error = %err, "unhandled transaction failure");
                Err(err)
            }
        },
    };

    // Listeners run outside the store borrow and may queue new units.
    engine.feed.flush();
    outcome
}

fn transact<T>(engine: &Engine, table: &str, mode: TransactionMode, work: Work<T>) -> Result<T> {
    let mut store = engine.store.borrow_mut();
    if !store.is_open() {
        debug!(store = store.name(), "opening store");
        store.open()?;
    }
    store.transaction(mode, table, work)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use ripple_core::schema::StoreSchema;
    use ripple_core::{record, Value};
    use std::cell::RefCell;

    fn database() -> Database {
        let schema = StoreSchema::new(1).declare("friends", "++id, age").unwrap();
        Database::new("executor", schema)
    }

    #[test]
    fn test_executor_busy_rejection() {
        let db = database();
        let executor = db.executor();
        let results = Rc::new(RefCell::new(Vec::new()));

        let sink = results.clone();
        let first = executor.run(
            "friends",
            TransactionMode::ReadWrite,
            |mut t| t.put(record! { "age" => 30 }, None),
            move |key| sink.borrow_mut().push(key),
            None,
        );
        let sink = results.clone();
        let second = executor.run(
            "friends",
            TransactionMode::ReadWrite,
            |mut t| t.put(record! { "age" => 31 }, None),
            move |key| sink.borrow_mut().push(key),
            None,
        );

        assert_eq!(first, Submission::Scheduled);
        assert_eq!(second, Submission::BusyRejected);
        assert!(executor.is_busy());

        db.run_pending().unwrap();
        assert!(!executor.is_busy());
        assert_eq!(*results.borrow(), vec![Value::Int64(1)]);

        let sink = results.clone();
        let third = executor.run(
            "friends",
            TransactionMode::ReadWrite,
            |mut t| t.put(record! { "age" => 32 }, None),
            move |key| sink.borrow_mut().push(key),
            None,
        );
        assert!(third.is_scheduled());
        db.run_pending().unwrap();
        assert_eq!(*results.borrow(), vec![Value::Int64(1), Value::Int64(2)]);
    }

    #[test]
    fn test_executor_opens_store() {
        let db = database();
        assert!(!db.is_open());

        let executor = db.executor();
        executor.run("friends", TransactionMode::ReadOnly, |t| Ok(t.count()), |_| {}, None);
        db.run_pending().unwrap();
        assert!(db.is_open());
    }

    #[test]
    fn test_executor_routes_failure_to_handler() {
        let db = database();
        let executor = db.executor();
        let failure = Rc::new(RefCell::new(None));

        let sink = failure.clone();
        executor.run(
            "friends",
            TransactionMode::ReadOnly,
            |mut t| t.put(record! { "age" => 1 }, None),
            |_| panic!("read-only put succeeded"),
            Some(Box::new(move |err: Error| *sink.borrow_mut() = Some(err))),
        );
        assert_eq!(db.run_pending(), Ok(1));

        let err = failure.borrow_mut().take().unwrap();
        assert!(matches!(&err, Error::TransactionFailed { table, .. } if table == "friends"));
        assert_eq!(err.root_cause(), &Error::read_only("friends"));
        assert!(!executor.is_busy());
    }

    #[test]
    fn test_executor_unhandled_failure_stops_drain() {
        let db = database();
        let executor = db.executor();
        executor.run::<()>(
            "missing",
            TransactionMode::ReadOnly,
            |_| Ok(()),
            |_| {},
            None,
        );

        let err = db.run_pending().unwrap_err();
        assert_eq!(
            err,
            Error::transaction_failed("missing", Error::table_not_found("missing"))
        );
        assert!(!executor.is_busy());
    }

    #[test]
    fn test_executor_open_failure() {
        let db = database();
        db.with_store(|store| store.block(Some(String::from("upgrade blocked"))));
        let executor = db.executor();
        let failure = Rc::new(RefCell::new(None));

        let sink = failure.clone();
        executor.run(
            "friends",
            TransactionMode::ReadOnly,
            |t| Ok(t.count()),
            |_| {},
            Some(Box::new(move |err: Error| *sink.borrow_mut() = Some(err))),
        );
        db.run_pending().unwrap();

        assert_eq!(
            failure.borrow_mut().take(),
            Some(Error::store_not_openable("upgrade blocked"))
        );
    }

    #[test]
    fn test_executor_monitor_brackets_units() {
        let db = Database::with_config(
            "monitored",
            StoreSchema::new(1).declare("friends", "++id").unwrap(),
            crate::DatabaseConfig::new().with_monitor(true),
        );
        let executor = db.executor();
        executor.run::<()>("friends", TransactionMode::ReadOnly, |_| Ok(()), |_| {}, None);
        db.run_pending().unwrap();
        executor.run::<()>(
            "friends",
            TransactionMode::ReadOnly,
            |_| Err(Error::StoreClosed),
            |_| {},
            Some(Box::new(|_| {})),
        );
        db.run_pending().unwrap();

        let stats = db.stats().transactions.unwrap();
        assert_eq!(stats.fulfilled, 2);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.max_active, 1);
    }

    #[test]
    fn test_executor_prepare_reads_current_state() {
        let db = database();
        let executor = db.executor();
        let table = Rc::new(RefCell::new(String::from("nowhere")));
        let seen = Rc::new(RefCell::new(None));

        let current = table.clone();
        let sink = seen.clone();
        executor.run_with(
            move || {
                let table = current.borrow().clone();
                Some(WorkUnit::new(table, TransactionMode::ReadOnly, |t| {
                    Ok(String::from(t.name()))
                }))
            },
            move |name| *sink.borrow_mut() = Some(name),
            None,
        );
        *table.borrow_mut() = String::from("friends");

        db.run_pending().unwrap();
        assert_eq!(seen.borrow().as_deref(), Some("friends"));
    }

    #[test]
    fn test_executor_skipped_unit_clears_busy() {
        let db = database();
        let executor = db.executor();
        executor.run_with::<()>(|| None, |_| {}, None);
        assert!(executor.is_busy());
        db.run_pending().unwrap();
        assert!(!executor.is_busy());
    }
}
