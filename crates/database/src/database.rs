//! Database - Main entry point for Ripple.
//!
//! A `Database` owns the shared engine state: the store, its change feed, the
//! change dispatcher, the task queue and the transaction monitor. Bindings,
//! item caches and executors created from it share that state.

use crate::binding::QueryBinding;
use crate::config::DatabaseConfig;
use crate::executor::TransactionExecutor;
use crate::item_cache::ItemCache;
use crate::monitor::{Clock, MonitoredId, TransactionMonitor};
use crate::scheduler::TaskQueue;
use crate::stats::EngineStats;
use ripple_core::schema::StoreSchema;
use ripple_core::Result;
use ripple_query::QueryDescriptor;
use ripple_reactive::{next_subscriber_id, ChangeDispatcher, SubscriberId};
use ripple_storage::{ChangeFeed, Store};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, warn};

/// State shared by everything created from one [`Database`].
pub(crate) struct Engine {
    pub(crate) config: DatabaseConfig,
    pub(crate) store: RefCell<Store>,
    pub(crate) feed: Rc<ChangeFeed>,
    pub(crate) dispatcher: Rc<ChangeDispatcher>,
    pub(crate) queue: TaskQueue,
    monitor: RefCell<TransactionMonitor>,
    monitoring: Cell<bool>,
}

impl Engine {
    /// Starts monitoring a unit if monitoring is on.
    pub(crate) fn monitor_start(&self) -> Option<MonitoredId> {
        self.monitoring
            .get()
            .then(|| self.monitor.borrow_mut().start())
    }

    pub(crate) fn monitor_end(&self, id: Option<MonitoredId>) {
        if let Some(id) = id {
            if let Err(err) = self.monitor.borrow_mut().end(id) {
                warn!(error = %err, "transaction monitor out of sync");
            }
        }
    }
}

/// The engine context.
///
/// Cloning a `Database` yields another handle to the same engine.
#[derive(Clone)]
pub struct Database {
    engine: Rc<Engine>,
}

impl Database {
    /// Creates a database with the default configuration. The store opens on first use.
    pub fn new(name: impl Into<String>, schema: StoreSchema) -> Self {
        Self::with_config(name, schema, DatabaseConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        schema: StoreSchema,
        config: DatabaseConfig,
    ) -> Self {
        let store = Store::new(name, schema);
        let feed = store.feed();
        let dispatcher = ChangeDispatcher::new(feed.clone());
        let monitor = TransactionMonitor::new(config.recent_window);
        let monitoring = Cell::new(config.monitor);
        Self {
            engine: Rc::new(Engine {
                config,
                store: RefCell::new(store),
                feed,
                dispatcher,
                queue: TaskQueue::new(),
                monitor: RefCell::new(monitor),
                monitoring,
            }),
        }
    }

    pub(crate) fn engine(&self) -> &Rc<Engine> {
        &self.engine
    }

    /// Returns the store name.
    pub fn name(&self) -> String {
        self.engine.store.borrow().name().to_string()
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.engine.config
    }

    /// Opens the store. Executors also open it on demand.
    pub fn open(&self) -> Result<()> {
        self.engine.store.borrow_mut().open()
    }

    pub fn is_open(&self) -> bool {
        self.engine.store.borrow().is_open()
    }

    /// Closes the store. Data and subscriptions survive; the next unit reopens it.
    pub fn close(&self) {
        self.engine.store.borrow_mut().close();
    }

    /// Runs `f` with exclusive access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        f(&mut self.engine.store.borrow_mut())
    }

    /// Returns the change dispatcher.
    pub fn dispatcher(&self) -> Rc<ChangeDispatcher> {
        self.engine.dispatcher.clone()
    }

    /// Creates a transaction executor with its own busy flag.
    pub fn executor(&self) -> TransactionExecutor {
        TransactionExecutor::new(self.engine.clone())
    }

    /// Binds `descriptor` on `table` to a live result and requests its first execution.
    pub fn bind(&self, table: impl Into<String>, descriptor: QueryDescriptor) -> QueryBinding {
        QueryBinding::new(self.engine.clone(), table.into(), descriptor)
    }

    /// Creates an item cache on `table`, keyed by `id_field` or the configured id field.
    pub fn item_cache(&self, table: impl Into<String>, id_field: Option<&str>) -> ItemCache {
        let id_field = id_field.unwrap_or(&self.engine.config.id_field);
        ItemCache::new(self.engine.clone(), table.into(), id_field.to_string())
    }

    /// Calls `callback` with the table key after every commit touching `table`.
    pub fn on_table_change(
        &self,
        table: impl Into<String>,
        callback: impl Fn(&str) + 'static,
    ) -> TableSubscription {
        let id = next_subscriber_id();
        self.engine.dispatcher.subscribe(id, table, callback);
        TableSubscription {
            dispatcher: self.engine.dispatcher.clone(),
            id,
            active: true,
        }
    }

    /// Runs queued units until the queue is idle.
    ///
    /// Returns the number of units run, or the first unhandled transaction failure.
    pub fn run_pending(&self) -> Result<usize> {
        let ran = self.engine.queue.run_until_idle()?;
        // Commits made outside an executor are delivered here.
        self.engine.feed.flush();
        Ok(ran)
    }

    /// Returns the number of queued units.
    pub fn pending_tasks(&self) -> usize {
        self.engine.queue.len()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            dispatcher: self.engine.dispatcher.stats(),
            transactions: self
                .engine
                .monitoring
                .get()
                .then(|| self.engine.monitor.borrow().stats()),
        }
    }

    /// Turns transaction monitoring on or off. History is kept across toggles.
    pub fn set_monitoring(&self, enabled: bool) {
        debug!(enabled, "transaction monitoring");
        self.engine.monitoring.set(enabled);
    }

    pub fn is_monitoring(&self) -> bool {
        self.engine.monitoring.get()
    }

    /// Replaces the monitor's clock, discarding its history.
    pub fn set_clock(&self, clock: Rc<dyn Clock>) {
        *self.engine.monitor.borrow_mut() =
            TransactionMonitor::with_clock(clock, self.engine.config.recent_window);
    }
}

/// Guard of a raw table-change subscription. Dropping it unsubscribes.
pub struct TableSubscription {
    dispatcher: Rc<ChangeDispatcher>,
    id: SubscriberId,
    active: bool,
}

impl TableSubscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Unsubscribes. Returns false if already unsubscribed.
    pub fn unsubscribe(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.dispatcher.unsubscribe(self.id)
    }
}

impl Drop for TableSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
