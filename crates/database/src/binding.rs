//! Reactive query binding.
//!
//! A binding ties a table and a query descriptor to a live result. It re-executes
//! when its descriptor or table changes and whenever a commit touches its table,
//! and only replaces its value (and notifies consumers) when the new result is
//! different from the held one.

use crate::database::Engine;
use crate::executor::{Submission, TransactionExecutor, WorkUnit};
use ripple_query::{compile, QueryDescriptor, QueryResult};
use ripple_reactive::{next_subscriber_id, SubscriberId, SubscriptionId, SubscriptionManager};
use ripple_storage::TransactionMode;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

type FetchCallback = Box<dyn FnOnce(Option<&QueryResult>)>;

struct BindingState {
    id: SubscriberId,
    engine: Rc<Engine>,
    table: RefCell<String>,
    descriptor: RefCell<QueryDescriptor>,
    value: RefCell<Option<QueryResult>>,
    version: Cell<u64>,
    executor: TransactionExecutor,
    consumers: RefCell<SubscriptionManager<QueryResult>>,
    /// One-shot callbacks waiting for the next successful execution.
    waiting: RefCell<Vec<FetchCallback>>,
    closed: Cell<bool>,
}

impl BindingState {
    fn watch(self: &Rc<Self>) {
        let this = Rc::downgrade(self);
        let table = self.table.borrow().clone();
        self.engine.dispatcher.subscribe(self.id, table, move |_| {
            if let Some(state) = this.upgrade() {
                state.request();
            }
        });
    }

    /// Requests an execution. A closed binding rejects every request.
    fn request(self: &Rc<Self>) -> Submission {
        if self.closed.get() {
            return Submission::BusyRejected;
        }
        let prepare = {
            let this = Rc::downgrade(self);
            move || this.upgrade().and_then(|state| state.unit())
        };
        let on_success = {
            let this: Weak<Self> = Rc::downgrade(self);
            move |result| {
                if let Some(state) = this.upgrade() {
                    state.apply(result);
                }
            }
        };
        let submission = self.executor.run_with(prepare, on_success, None);
        trace!(id = self.id, ?submission, "binding execution requested");
        submission
    }

    /// Builds the unit from the table and descriptor current at execution time.
    fn unit(&self) -> Option<WorkUnit<QueryResult>> {
        if self.closed.get() {
            return None;
        }
        let table = self.table.borrow().clone();
        let descriptor = self.descriptor.borrow().clone();
        let mode = if descriptor.is_write() {
            TransactionMode::ReadWrite
        } else {
            TransactionMode::ReadOnly
        };
        Some(WorkUnit::new(table, mode, move |t| compile(t, &descriptor)))
    }

    fn apply(&self, result: QueryResult) {
        let changed = self.value.borrow().as_ref() != Some(&result);
        if changed {
            *self.value.borrow_mut() = Some(result);
            self.version.set(self.version.get() + 1);
            debug!(id = self.id, version = self.version.get(), "binding value changed");

            let callbacks = self.consumers.borrow().callbacks();
            let value = self.value.borrow().clone();
            if let Some(value) = value {
                for callback in callbacks {
                    callback(&value);
                }
            }
        }

        let waiting = std::mem::take(&mut *self.waiting.borrow_mut());
        if !waiting.is_empty() {
            let value = self.value.borrow().clone();
            for callback in waiting {
                callback(value.as_ref());
            }
        }
    }
}

/// A live query result.
///
/// Dropping the binding closes it.
pub struct QueryBinding {
    state: Rc<BindingState>,
}

impl QueryBinding {
    pub(crate) fn new(engine: Rc<Engine>, table: String, descriptor: QueryDescriptor) -> Self {
        let executor = TransactionExecutor::new(engine.clone());
        let state = Rc::new(BindingState {
            id: next_subscriber_id(),
            engine,
            table: RefCell::new(table),
            descriptor: RefCell::new(descriptor),
            value: RefCell::new(None),
            version: Cell::new(0),
            executor,
            consumers: RefCell::new(SubscriptionManager::new()),
            waiting: RefCell::new(Vec::new()),
            closed: Cell::new(false),
        });
        state.watch();
        state.request();
        Self { state }
    }

    /// Returns the dispatcher subscriber id of this binding.
    pub fn id(&self) -> SubscriberId {
        self.state.id
    }

    /// Returns the held value, `None` until the first successful execution.
    pub fn value(&self) -> Option<QueryResult> {
        self.state.value.borrow().clone()
    }

    /// Applies `f` to the held value.
    pub fn map_value<R>(&self, f: impl FnOnce(&QueryResult) -> R) -> Option<R> {
        self.state.value.borrow().as_ref().map(f)
    }

    /// Returns true while an execution is outstanding.
    pub fn is_busy(&self) -> bool {
        self.state.executor.is_busy()
    }

    /// Number of times the held value was replaced.
    pub fn version(&self) -> u64 {
        self.state.version.get()
    }

    pub fn table(&self) -> String {
        self.state.table.borrow().clone()
    }

    pub fn descriptor(&self) -> QueryDescriptor {
        self.state.descriptor.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.get()
    }

    /// Replaces the descriptor. Re-executes only if it differs from the current one.
    pub fn set_descriptor(&self, descriptor: QueryDescriptor) -> Option<Submission> {
        if *self.state.descriptor.borrow() == descriptor {
            return None;
        }
        *self.state.descriptor.borrow_mut() = descriptor;
        Some(self.state.request())
    }

    /// Moves the binding to another table and re-executes. Does nothing if the
    /// table is the current one.
    pub fn set_table(&self, table: impl Into<String>) -> Option<Submission> {
        let table = table.into();
        if *self.state.table.borrow() == table {
            return None;
        }
        *self.state.table.borrow_mut() = table;
        if !self.state.closed.get() {
            self.state.watch();
        }
        Some(self.state.request())
    }

    /// Requests a re-execution.
    pub fn refresh(&self) -> Submission {
        self.state.request()
    }

    /// Delivers a value to `callback`.
    ///
    /// If `table` or `descriptor` differ from the current ones they are applied
    /// and the callback receives the value of the next successful execution.
    /// Otherwise it receives the held value now, if there is one.
    pub fn fetch(
        &self,
        table: Option<&str>,
        descriptor: Option<QueryDescriptor>,
        callback: impl FnOnce(Option<&QueryResult>) + 'static,
    ) {
        let table_changed = table.is_some_and(|t| *self.state.table.borrow() != t);
        let descriptor_changed = descriptor
            .as_ref()
            .is_some_and(|d| *self.state.descriptor.borrow() != *d);

        if !table_changed && !descriptor_changed {
            let value = self.state.value.borrow().clone();
            if value.is_some() {
                callback(value.as_ref());
            }
            return;
        }

        self.state.waiting.borrow_mut().push(Box::new(callback));
        if let Some(descriptor) = descriptor.filter(|_| descriptor_changed) {
            *self.state.descriptor.borrow_mut() = descriptor;
        }
        match table.filter(|_| table_changed) {
            Some(table) => {
                self.set_table(table);
            }
            None => {
                self.state.request();
            }
        }
    }

    /// Registers a consumer notified with every new value.
    pub fn subscribe(&self, callback: impl Fn(&QueryResult) + 'static) -> SubscriptionId {
        self.state.consumers.borrow_mut().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.consumers.borrow_mut().unsubscribe(id)
    }

    /// Stops watching the table and drops every consumer. Idempotent.
    pub fn close(&self) {
        if self.state.closed.replace(true) {
            return;
        }
        self.state.engine.dispatcher.unsubscribe(self.state.id);
        self.state.consumers.borrow_mut().clear();
        self.state.waiting.borrow_mut().clear();
        debug!(id = self.state.id, "binding closed");
    }
}

impl Drop for QueryBinding {
    fn drop(&mut self) {
        self.close();
    }
}
