//! Change dispatcher: fans table-level commit notifications out to subscribers.
//!
//! The dispatcher listens to a store's [`ChangeFeed`] and keeps a registry of
//! subscribers keyed by table. Each subscriber watches at most one table at a
//! time; subscribing an id again moves it to the new table.

use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::{HashMap, HashSet};
use ripple_storage::{ChangeFeed, ChangeRecord, ListenerId};
use serde::Serialize;
use tracing::debug;

/// Identifier of a dispatcher subscriber.
pub type SubscriberId = u64;

/// Callback invoked with the key of a changed table.
pub type TableCallback = Rc<dyn Fn(&str)>;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh subscriber id. Ids increase monotonically per process.
pub fn next_subscriber_id() -> SubscriberId {
    NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Snapshot of the dispatcher registry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Number of tables with at least one subscriber.
    pub subscriptions: usize,
    /// Keys of the watched tables, sorted.
    pub tables: Vec<String>,
    /// Number of subscribers.
    pub subscribers: usize,
}

#[derive(Default)]
struct Registry {
    /// Subscriber -> watched table.
    tables_by_subscriber: HashMap<SubscriberId, String>,
    /// Table -> subscribers, in subscription order.
    subscribers_by_table: HashMap<String, Vec<(SubscriberId, TableCallback)>>,
}

impl Registry {
    fn remove(&mut self, id: SubscriberId) -> bool {
        let Some(table) = self.tables_by_subscriber.remove(&id) else {
            return false;
        };
        if let Some(subscribers) = self.subscribers_by_table.get_mut(&table) {
            subscribers.retain(|(sub_id, _)| *sub_id != id);
            if subscribers.is_empty() {
                self.subscribers_by_table.remove(&table);
            }
        }
        true
    }

    fn callbacks_for(&self, table: &str) -> Vec<TableCallback> {
        self.subscribers_by_table
            .get(table)
            .map(|subs| subs.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }
}

/// Pub/sub keyed by table, fed by a [`ChangeFeed`].
pub struct ChangeDispatcher {
    feed: Rc<ChangeFeed>,
    registry: RefCell<Registry>,
    listener: Cell<Option<ListenerId>>,
    this: Weak<ChangeDispatcher>,
}

impl ChangeDispatcher {
    /// Creates a dispatcher for the given feed.
    ///
    /// The dispatcher does not listen to the feed until the first subscription.
    pub fn new(feed: Rc<ChangeFeed>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            feed,
            registry: RefCell::new(Registry::default()),
            listener: Cell::new(None),
            this: this.clone(),
        })
    }

    /// Returns true once the dispatcher listens to its feed.
    pub fn is_attached(&self) -> bool {
        self.listener.get().is_some()
    }

    fn attach(&self) {
        if self.is_attached() {
            return;
        }
        let this = self.this.clone();
        let id = self.feed.listen(move |changes| {
            if let Some(dispatcher) = this.upgrade() {
                dispatcher.dispatch(changes);
            }
        });
        debug!(listener = id, "dispatcher attached to change feed");
        self.listener.set(Some(id));
    }

    /// Registers `callback` for changes to `table`.
    ///
    /// If `id` already watches a table, the old association is replaced.
    pub fn subscribe<F>(&self, id: SubscriberId, table: impl Into<String>, callback: F)
    where
        F: Fn(&str) + 'static,
    {
        self.attach();
        let table = table.into();
        let mut registry = self.registry.borrow_mut();
        registry.remove(id);
        registry
            .subscribers_by_table
            .entry(table.clone())
            .or_default()
            .push((id, Rc::new(callback)));
        registry.tables_by_subscriber.insert(id, table);
    }

    /// Removes a subscriber.
    ///
    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.registry.borrow_mut().remove(id)
    }

    /// Returns the table a subscriber watches.
    pub fn table_of(&self, id: SubscriberId) -> Option<String> {
        self.registry.borrow().tables_by_subscriber.get(&id).cloned()
    }

    /// Notifies the subscribers of every table touched by `changes`.
    ///
    /// Tables are visited in order of first appearance; each subscriber of a
    /// table is invoked once per call. The registry is not borrowed while
    /// callbacks run.
    pub fn dispatch(&self, changes: &[ChangeRecord]) {
        let mut seen = HashSet::new();
        let tables: Vec<&str> = changes
            .iter()
            .map(|change| change.table.as_str())
            .filter(|table| seen.insert(*table))
            .collect();

        for table in tables {
            let callbacks = self.registry.borrow().callbacks_for(table);
            if callbacks.is_empty() {
                continue;
            }
            debug!(table, subscribers = callbacks.len(), "dispatching table change");
            for callback in callbacks {
                callback(table);
            }
        }
    }

    /// Returns a snapshot of the registry.
    pub fn stats(&self) -> DispatcherStats {
        let registry = self.registry.borrow();
        let mut tables: Vec<String> = registry.subscribers_by_table.keys().cloned().collect();
        tables.sort();
        DispatcherStats {
            subscriptions: tables.len(),
            tables,
            subscribers: registry.tables_by_subscriber.len(),
        }
    }

    /// Returns the number of subscribers.
    pub fn len(&self) -> usize {
        self.registry.borrow().tables_by_subscriber.len()
    }

    /// Returns true if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all subscribers. The feed listener stays attached.
    pub fn clear(&self) {
        let mut registry = self.registry.borrow_mut();
        registry.tables_by_subscriber.clear();
        registry.subscribers_by_table.clear();
    }
}

impl Drop for ChangeDispatcher {
    fn drop(&mut self) {
        if let Some(id) = self.listener.take() {
            self.feed.unlisten(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use ripple_core::{record, Value};

    fn change(table: &str, key: i64) -> ChangeRecord {
        ChangeRecord::put(table, Value::Int64(key), record! { "id" => key }, None)
    }

    fn counter() -> (Rc<RefCell<i32>>, impl Fn(&str) + 'static) {
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        (count, move |_: &str| *sink.borrow_mut() += 1)
    }

    #[test]
    fn test_dispatcher_subscribe_and_dispatch() {
        let dispatcher = ChangeDispatcher::new(Rc::new(ChangeFeed::new()));
        let (count, cb) = counter();

        dispatcher.subscribe(1, "friends", cb);
        dispatcher.dispatch(&[change("friends", 1)]);

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_dispatcher_other_table_not_notified() {
        let dispatcher = ChangeDispatcher::new(Rc::new(ChangeFeed::new()));
        let (count, cb) = counter();

        dispatcher.subscribe(1, "friends", cb);
        dispatcher.dispatch(&[change("pets", 1)]);

        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_dispatcher_once_per_dispatch() {
        let dispatcher = ChangeDispatcher::new(Rc::new(ChangeFeed::new()));
        let (count, cb) = counter();

        dispatcher.subscribe(1, "friends", cb);
        dispatcher.dispatch(&[change("friends", 1), change("friends", 2), change("friends", 3)]);

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_dispatcher_tables_in_first_appearance_order() {
        let dispatcher = ChangeDispatcher::new(Rc::new(ChangeFeed::new()));
        let order = Rc::new(RefCell::new(Vec::new()));

        for (id, table) in [(1, "a"), (2, "b"), (3, "c")] {
            let order = order.clone();
            dispatcher.subscribe(id, table, move |t| order.borrow_mut().push(String::from(t)));
        }

        dispatcher.dispatch(&[change("c", 1), change("a", 1), change("c", 2), change("b", 1)]);

        assert_eq!(*order.borrow(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_dispatcher_resubscribe_migrates() {
        let dispatcher = ChangeDispatcher::new(Rc::new(ChangeFeed::new()));
        let (old_count, old_cb) = counter();
        let (new_count, new_cb) = counter();

        dispatcher.subscribe(1, "friends", old_cb);
        dispatcher.subscribe(1, "pets", new_cb);

        assert_eq!(dispatcher.table_of(1).as_deref(), Some("pets"));
        assert_eq!(dispatcher.stats().tables, vec![String::from("pets")]);

        dispatcher.dispatch(&[change("friends", 1), change("pets", 1)]);
        assert_eq!(*old_count.borrow(), 0);
        assert_eq!(*new_count.borrow(), 1);
    }

    #[test]
    fn test_dispatcher_unsubscribe_idempotent() {
        let dispatcher = ChangeDispatcher::new(Rc::new(ChangeFeed::new()));
        let (count, cb) = counter();

        dispatcher.subscribe(1, "friends", cb);
        assert!(dispatcher.unsubscribe(1));
        assert!(!dispatcher.unsubscribe(1));
        assert!(!dispatcher.unsubscribe(42));

        dispatcher.dispatch(&[change("friends", 1)]);
        assert_eq!(*count.borrow(), 0);
        assert_eq!(dispatcher.stats(), DispatcherStats::default());
    }

    #[test]
    fn test_dispatcher_stats() {
        let dispatcher = ChangeDispatcher::new(Rc::new(ChangeFeed::new()));

        dispatcher.subscribe(1, "pets", |_| {});
        dispatcher.subscribe(2, "friends", |_| {});
        dispatcher.subscribe(3, "friends", |_| {});

        let stats = dispatcher.stats();
        assert_eq!(stats.subscriptions, 2);
        assert_eq!(stats.subscribers, 3);
        assert_eq!(stats.tables, vec![String::from("friends"), String::from("pets")]);

        dispatcher.unsubscribe(1);
        assert_eq!(dispatcher.stats().subscriptions, 1);
    }

    #[test]
    fn test_dispatcher_attaches_lazily_once() {
        let feed = Rc::new(ChangeFeed::new());
        let dispatcher = ChangeDispatcher::new(feed.clone());
        assert!(!dispatcher.is_attached());
        assert_eq!(feed.listener_count(), 0);

        dispatcher.subscribe(1, "friends", |_| {});
        dispatcher.subscribe(2, "pets", |_| {});
        assert!(dispatcher.is_attached());
        assert_eq!(feed.listener_count(), 1);

        drop(dispatcher);
        assert_eq!(feed.listener_count(), 0);
    }

    #[test]
    fn test_dispatcher_receives_from_feed() {
        let feed = Rc::new(ChangeFeed::new());
        let dispatcher = ChangeDispatcher::new(feed.clone());
        let (count, cb) = counter();
        dispatcher.subscribe(1, "friends", cb);

        feed.publish(vec![change("friends", 1)]);
        assert_eq!(*count.borrow(), 0);
        feed.flush();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_dispatcher_callback_may_unsubscribe() {
        let dispatcher = ChangeDispatcher::new(Rc::new(ChangeFeed::new()));
        let count = Rc::new(RefCell::new(0));

        let weak = Rc::downgrade(&dispatcher);
        let sink = count.clone();
        dispatcher.subscribe(1, "friends", move |_| {
            *sink.borrow_mut() += 1;
            if let Some(d) = weak.upgrade() {
                d.unsubscribe(1);
                d.subscribe(2, "friends", |_| {});
            }
        });

        dispatcher.dispatch(&[change("friends", 1)]);
        dispatcher.dispatch(&[change("friends", 2)]);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn test_next_subscriber_id_increases() {
        let a = next_subscriber_id();
        let b = next_subscriber_id();
        assert!(b > a);
    }

    #[test]
    fn test_dispatcher_clear() {
        let dispatcher = ChangeDispatcher::new(Rc::new(ChangeFeed::new()));
        dispatcher.subscribe(1, "friends", |_| {});
        dispatcher.clear();
        assert!(dispatcher.is_empty());
        assert!(dispatcher.is_attached());
    }
}
