//! Commit notification stream.
//!
//! Every committed transaction with at least one write publishes its change records as
//! one batch. Batches are queued and delivered by [`ChangeFeed::flush`], which the owner
//! calls once no store borrow is held, so listeners are free to start new work.

use crate::journal::ChangeRecord;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

/// Listener ID type.
pub type ListenerId = u64;

type Listener = Rc<dyn Fn(&[ChangeRecord])>;

/// The global commit-notification stream of a store.
#[derive(Default)]
pub struct ChangeFeed {
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_id: Cell<ListenerId>,
    pending: RefCell<VecDeque<Vec<ChangeRecord>>>,
    flushing: Cell<bool>,
}

impl ChangeFeed {
    /// Creates an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for every delivered batch.
    pub fn listen(&self, listener: impl Fn(&[ChangeRecord]) + 'static) -> ListenerId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unlisten(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Queues a batch for delivery. Empty batches are dropped.
    pub fn publish(&self, batch: Vec<ChangeRecord>) {
        if !batch.is_empty() {
            self.pending.borrow_mut().push_back(batch);
        }
    }

    /// Returns the number of queued batches.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Delivers queued batches in commit order, returning how many were delivered.
    ///
    /// Batches published by listeners during the flush are delivered in the same call.
    /// A nested call from inside a listener returns 0.
    pub fn flush(&self) -> usize {
        if self.flushing.replace(true) {
            return 0;
        }

        let mut delivered = 0;
        loop {
            let Some(batch) = self.pending.borrow_mut().pop_front() else {
                break;
            };
            // Snapshot, so listeners can (un)register while being called
            let listeners: Vec<Listener> = self
                .listeners
                .borrow()
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect();
            for listener in listeners {
                listener(&batch);
            }
            delivered += 1;
        }

        self.flushing.set(false);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use ripple_core::{record, Value};

    fn batch(table: &str, key: i64) -> Vec<ChangeRecord> {
        vec![ChangeRecord::put(table, Value::Int64(key), record! { "id" => key }, None)]
    }

    #[test]
    fn test_feed_delivers_in_order() {
        let feed = ChangeFeed::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        feed.listen(move |changes| sink.borrow_mut().push(changes[0].table.clone()));

        feed.publish(batch("a", 1));
        feed.publish(batch("b", 1));
        assert_eq!(feed.pending(), 2);
        assert!(seen.borrow().is_empty());

        assert_eq!(feed.flush(), 2);
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
        assert_eq!(feed.pending(), 0);
    }

    #[test]
    fn test_feed_drops_empty_batches() {
        let feed = ChangeFeed::new();
        feed.publish(Vec::new());
        assert_eq!(feed.pending(), 0);
        assert_eq!(feed.flush(), 0);
    }

    #[test]
    fn test_feed_unlisten() {
        let feed = ChangeFeed::new();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let id = feed.listen(move |_| counter.set(counter.get() + 1));
        assert_eq!(feed.listener_count(), 1);

        assert!(feed.unlisten(id));
        assert!(!feed.unlisten(id));
        feed.publish(batch("a", 1));
        feed.flush();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_feed_listener_may_publish_and_unlisten() {
        let feed = Rc::new(ChangeFeed::new());
        let calls = Rc::new(Cell::new(0));

        let inner = feed.clone();
        let counter = calls.clone();
        feed.listen(move |changes| {
            counter.set(counter.get() + 1);
            if changes[0].key == Value::Int64(1) {
                inner.publish(batch("a", 2));
                // nested flush is a no-op
                assert_eq!(inner.flush(), 0);
            }
        });

        feed.publish(batch("a", 1));
        assert_eq!(feed.flush(), 2);
        assert_eq!(calls.get(), 2);
    }
}
