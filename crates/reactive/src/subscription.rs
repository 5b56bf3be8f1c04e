//! Subscription management for live values.
//!
//! This module provides subscription IDs and a manager for tracking the consumer
//! callbacks of a live value (a query binding or an item cache).

use alloc::rc::Rc;
use alloc::vec::Vec;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for value notifications.
pub type Callback<T> = Rc<dyn Fn(&T)>;

/// Manages the consumer callbacks of one live value.
///
/// Callbacks are notified in subscription order.
pub struct SubscriptionManager<T: ?Sized> {
    /// Active subscriptions
    subscriptions: Vec<(SubscriptionId, Callback<T>)>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl<T: ?Sized> Default for SubscriptionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> SubscriptionManager<T> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 1,
        }
    }

    /// Subscribes with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.push((id, Rc::new(callback)));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|(sub_id, _)| *sub_id != id);
        self.subscriptions.len() != before
    }

    /// Returns a snapshot of the callbacks.
    ///
    /// Call them after releasing any borrow of the manager, so callbacks may
    /// subscribe or unsubscribe.
    pub fn callbacks(&self) -> Vec<Callback<T>> {
        self.subscriptions.iter().map(|(_, cb)| cb.clone()).collect()
    }

    /// Notifies every subscription.
    pub fn notify_all(&self, value: &T) {
        for callback in self.callbacks() {
            callback(value);
        }
    }

    /// Returns the number of active subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns all subscription IDs.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.iter().map(|(id, _)| *id).collect()
    }

    /// Clears all subscriptions.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}
