//! Identifier-batch cache.
//!
//! An item cache keeps a growing set of primary keys of interest and a map from
//! each key to its latest record. Every fetch selects all tracked keys in one
//! transaction and rebuilds the map from scratch; commits to the table trigger a
//! refetch.

use crate::database::Engine;
use crate::executor::{Submission, TransactionExecutor, WorkUnit};
use ripple_core::{Record, Value};
use ripple_query::{compile, QueryDescriptor, WhereClause};
use ripple_reactive::{next_subscriber_id, SubscriberId, SubscriptionId, SubscriptionManager};
use ripple_storage::TransactionMode;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tracing::debug;

/// Records by primary key.
pub type Items = BTreeMap<Value, Record>;

/// Callback receiving one item after a fetch.
pub type ItemCallback = Box<dyn FnOnce(Option<&Record>)>;

struct CacheState {
    id: SubscriberId,
    engine: Rc<Engine>,
    table: String,
    id_field: String,
    tracked: RefCell<BTreeSet<Value>>,
    items: RefCell<Items>,
    /// Callbacks waiting for the next successful fetch.
    waiting: RefCell<Vec<(Value, ItemCallback)>>,
    executor: TransactionExecutor,
    consumers: RefCell<SubscriptionManager<Items>>,
    closed: Cell<bool>,
}

impl CacheState {
    fn fetch_all(self: &Rc<Self>) -> Submission {
        if self.closed.get() {
            return Submission::BusyRejected;
        }
        let prepare = {
            let this = Rc::downgrade(self);
            move || this.upgrade().and_then(|state| state.unit())
        };
        let on_success = {
            let this = Rc::downgrade(self);
            move |records: Vec<Record>| {
                if let Some(state) = this.upgrade() {
                    state.apply(records);
                }
            }
        };
        self.executor.run_with(prepare, on_success, None)
    }

    /// Selects every key tracked at execution time.
    fn unit(&self) -> Option<WorkUnit<Vec<Record>>> {
        if self.closed.get() {
            return None;
        }
        let ids: Vec<Value> = self.tracked.borrow().iter().cloned().collect();
        let descriptor = QueryDescriptor::new().where_clause(WhereClause::new(
            self.id_field.as_str(),
            "anyOf",
            Value::Array(ids),
        ));
        Some(WorkUnit::new(
            self.table.as_str(),
            TransactionMode::ReadOnly,
            move |t| Ok(compile(t, &descriptor)?.into_records().unwrap_or_default()),
        ))
    }

    fn apply(&self, records: Vec<Record>) {
        let items: Items = records
            .into_iter()
            .filter_map(|record| {
                let key = record.get_path(&self.id_field).cloned()?;
                Some((key, record))
            })
            .collect();
        debug!(table = %self.table, items = items.len(), "item cache refreshed");
        *self.items.borrow_mut() = items;

        let waiting = std::mem::take(&mut *self.waiting.borrow_mut());
        for (id, callback) in waiting {
            let item = self.items.borrow().get(&id).cloned();
            callback(item.as_ref());
        }

        let callbacks = self.consumers.borrow().callbacks();
        if !callbacks.is_empty() {
            let items = self.items.borrow().clone();
            for callback in callbacks {
                callback(&items);
            }
        }
    }
}

/// A reactive cache of records fetched by primary key.
///
/// Dropping the cache closes it.
pub struct ItemCache {
    state: Rc<CacheState>,
}

impl ItemCache {
    pub(crate) fn new(engine: Rc<Engine>, table: String, id_field: String) -> Self {
        let executor = TransactionExecutor::new(engine.clone());
        let state = Rc::new(CacheState {
            id: next_subscriber_id(),
            engine,
            table,
            id_field,
            tracked: RefCell::new(BTreeSet::new()),
            items: RefCell::new(BTreeMap::new()),
            waiting: RefCell::new(Vec::new()),
            executor,
            consumers: RefCell::new(SubscriptionManager::new()),
            closed: Cell::new(false),
        });

        let this = Rc::downgrade(&state);
        state
            .engine
            .dispatcher
            .subscribe(state.id, state.table.clone(), move |_| {
                if let Some(state) = this.upgrade() {
                    state.fetch_all();
                }
            });
        Self { state }
    }

    pub fn table(&self) -> &str {
        &self.state.table
    }

    pub fn id_field(&self) -> &str {
        &self.state.id_field
    }

    /// Adds keys to the working set without fetching.
    pub fn track(&self, ids: impl IntoIterator<Item = Value>) {
        self.state.tracked.borrow_mut().extend(ids);
    }

    /// Returns the cached record for `id`.
    ///
    /// A tracked key answers from the cache, passing the record to `callback`
    /// too. An untracked key is tracked, a fetch is requested and `None` is
    /// returned; `callback` then receives the record after the next successful
    /// fetch.
    pub fn request(&self, id: impl Into<Value>, callback: Option<ItemCallback>) -> Option<Record> {
        let id = id.into();
        if self.state.tracked.borrow().contains(&id) {
            let item = self.state.items.borrow().get(&id).cloned();
            if let Some(callback) = callback {
                callback(item.as_ref());
            }
            return item;
        }

        self.state.tracked.borrow_mut().insert(id.clone());
        if let Some(callback) = callback {
            self.state.waiting.borrow_mut().push((id, callback));
        }
        self.state.fetch_all();
        None
    }

    /// Requests a fetch of every tracked key.
    pub fn fetch_all(&self) -> Submission {
        self.state.fetch_all()
    }

    /// Returns the cached record for `id` without tracking it.
    pub fn get(&self, id: &Value) -> Option<Record> {
        self.state.items.borrow().get(id).cloned()
    }

    /// Returns a copy of the cached map.
    pub fn items(&self) -> Items {
        self.state.items.borrow().clone()
    }

    /// Returns the tracked keys in key order.
    pub fn tracked(&self) -> Vec<Value> {
        self.state.tracked.borrow().iter().cloned().collect()
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.state.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.items.borrow().is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.state.executor.is_busy()
    }

    /// Registers a consumer notified with the whole map after every fetch.
    pub fn subscribe(&self, callback: impl Fn(&Items) + 'static) -> SubscriptionId {
        self.state.consumers.borrow_mut().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.consumers.borrow_mut().unsubscribe(id)
    }

    /// Stops watching the table. Idempotent.
    pub fn close(&self) {
        if self.state.closed.replace(true) {
            return;
        }
        self.state.engine.dispatcher.unsubscribe(self.state.id);
        self.state.consumers.borrow_mut().clear();
        self.state.waiting.borrow_mut().clear();
    }
}

impl Drop for ItemCache {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use ripple_core::record;
    use ripple_core::schema::StoreSchema;

    fn seeded() -> Database {
        let schema = StoreSchema::new(1).declare("friends", "id, a").unwrap();
        let db = Database::new("cache", schema);
        db.open().unwrap();
        db.with_store(|store| {
            store.transaction(TransactionMode::ReadWrite, "friends", |mut t| {
                t.bulk_put(vec![
                    record! { "id" => 1, "a" => 5 },
                    record! { "id" => 2, "a" => 9 },
                    record! { "id" => 3, "a" => 5 },
                ])
            })
        })
        .unwrap();
        db.run_pending().unwrap();
        db
    }

    #[test]
    fn test_item_cache_request_untracked() {
        let db = seeded();
        let cache = db.item_cache("friends", None);
        let seen = Rc::new(RefCell::new(None));

        let sink = seen.clone();
        let first = cache.request(
            1,
            Some(Box::new(move |r: Option<&Record>| *sink.borrow_mut() = r.cloned())),
        );
        assert_eq!(first, None);
        assert!(seen.borrow().is_none());

        db.run_pending().unwrap();
        assert_eq!(*seen.borrow(), Some(record! { "id" => 1, "a" => 5 }));
        assert_eq!(cache.request(1, None), Some(record! { "id" => 1, "a" => 5 }));
    }

    #[test]
    fn test_item_cache_track_then_fetch() {
        let db = seeded();
        let cache = db.item_cache("friends", Some("id"));
        cache.track([Value::Int64(1), Value::Int64(3)]);
        assert_eq!(db.pending_tasks(), 0);

        assert!(cache.fetch_all().is_scheduled());
        db.run_pending().unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.tracked(), vec![Value::Int64(1), Value::Int64(3)]);
        assert_eq!(cache.get(&Value::Int64(2)), None);
    }

    #[test]
    fn test_item_cache_refetches_after_delete() {
        let db = seeded();
        let cache = db.item_cache("friends", None);
        cache.track([Value::Int64(1), Value::Int64(3)]);
        cache.fetch_all();
        db.run_pending().unwrap();
        assert_eq!(cache.len(), 2);

        db.executor().run(
            "friends",
            TransactionMode::ReadWrite,
            |mut t| t.delete(&Value::Int64(3)),
            |_| {},
            None,
        );
        db.run_pending().unwrap();

        let mut expected = Items::new();
        expected.insert(Value::Int64(1), record! { "id" => 1, "a" => 5 });
        assert_eq!(cache.items(), expected);
    }

    #[test]
    fn test_item_cache_batches_requests() {
        let db = seeded();
        let cache = db.item_cache("friends", None);
        let hits = Rc::new(Cell::new(0));

        for id in [1, 2, 3] {
            let hits = hits.clone();
            cache.request(id, Some(Box::new(move |r: Option<&Record>| {
                assert!(r.is_some());
                hits.set(hits.get() + 1);
            })));
        }
        // One fetch queued, later requests rejected as busy and covered by it.
        assert_eq!(db.run_pending(), Ok(1));
        assert_eq!(hits.get(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_item_cache_missing_id() {
        let db = seeded();
        let cache = db.item_cache("friends", None);
        let seen = Rc::new(Cell::new(false));
        let sink = seen.clone();
        cache.request(42, Some(Box::new(move |r: Option<&Record>| sink.set(r.is_none()))));
        db.run_pending().unwrap();
        assert!(seen.get());
        assert!(cache.is_empty());
        assert_eq!(cache.tracked(), vec![Value::Int64(42)]);
    }

    #[test]
    fn test_item_cache_notifies_consumers() {
        let db = seeded();
        let cache = db.item_cache("friends", None);
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let sink = sizes.clone();
        let id = cache.subscribe(move |items| sink.borrow_mut().push(items.len()));

        cache.request(2, None);
        db.run_pending().unwrap();
        assert_eq!(*sizes.borrow(), vec![1]);

        assert!(cache.unsubscribe(id));
        cache.request(3, None);
        db.run_pending().unwrap();
        assert_eq!(*sizes.borrow(), vec![1]);
    }

    #[test]
    fn test_item_cache_close() {
        let db = seeded();
        let cache = db.item_cache("friends", None);
        assert_eq!(db.dispatcher().len(), 1);
        cache.close();
        cache.close();
        assert!(db.dispatcher().is_empty());
        assert_eq!(cache.fetch_all(), Submission::BusyRejected);
    }
}
