//! Ripple Reactive - change dispatch for reactive queries.
//!
//! This crate turns the per-commit change batches of a store's
//! [`ChangeFeed`](ripple_storage::ChangeFeed) into per-table notifications, and
//! provides the subscription bookkeeping live values use for their consumers.
//!
//! # Core Concepts
//!
//! - `ChangeDispatcher`: Routes table changes to subscribers keyed by table
//! - `SubscriptionManager`: Manages consumer callbacks of one live value
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use ripple_reactive::{next_subscriber_id, ChangeDispatcher};
//! use ripple_storage::{ChangeFeed, ChangeRecord};
//! use ripple_core::{record, Value};
//!
//! let feed = Rc::new(ChangeFeed::new());
//! let dispatcher = ChangeDispatcher::new(feed.clone());
//!
//! dispatcher.subscribe(next_subscriber_id(), "friends", |table| {
//!     println!("{table} changed");
//! });
//!
//! feed.publish(vec![ChangeRecord::put("friends", Value::Int64(1), record! { "id" => 1 }, None)]);
//! feed.flush();
//! ```

#![no_std]

extern crate alloc;

pub mod dispatcher;
pub mod subscription;

pub use dispatcher::{
    next_subscriber_id, ChangeDispatcher, DispatcherStats, SubscriberId, TableCallback,
};
pub use subscription::{Callback, SubscriptionId, SubscriptionManager};
