//! Ripple Storage - In-memory transactional table engine for Ripple.
//!
//! This crate provides the storage layer including:
//!
//! - `Store`: Named store that opens, closes and runs transactions over its tables
//! - `TableStore`: Record storage keyed by primary key, with index-ordered scans
//! - `TableCache`: Multi-table cache management
//! - `Journal`: Change tracking for transactions
//! - `Transaction`: Read-only / read-write transactions with rollback support
//! - `Table`, `WhereClause`, `Collection`: The primitive query builder
//! - `ChangeFeed`: The commit-notification stream
//!
//! # Example
//!
//! ```rust
//! use ripple_core::schema::StoreSchema;
//! use ripple_core::record;
//! use ripple_storage::{Store, TransactionMode};
//!
//! let schema = StoreSchema::new(1).declare("friends", "++id, age").unwrap();
//! let mut store = Store::new("app", schema);
//! store.open().unwrap();
//!
//! store
//!     .transaction(TransactionMode::ReadWrite, "friends", |mut table| {
//!         table.put(record! { "name" => "Alice", "age" => 25 }, None)
//!     })
//!     .unwrap();
//!
//! let adults = store
//!     .transaction(TransactionMode::ReadOnly, "friends", |table| {
//!         Ok(table.where_("age").above_or_equal(18).count())
//!     })
//!     .unwrap();
//! assert_eq!(adults, 1);
//! ```

#![no_std]

extern crate alloc;

pub mod cache;
pub mod collection;
pub mod condition;
pub mod feed;
pub mod journal;
pub mod store;
pub mod table;
pub mod table_store;
pub mod transaction;

pub use cache::TableCache;
pub use collection::{Collection, WhereClause};
pub use condition::Condition;
pub use feed::{ChangeFeed, ListenerId};
pub use journal::{ChangeKind, ChangeRecord, Journal};
pub use store::Store;
pub use table::Table;
pub use table_store::TableStore;
pub use transaction::{Transaction, TransactionId, TransactionMode, TransactionState};
