//! Ripple Database - reactive data access over a transactional table store.
//!
//! This crate ties the query compiler and the change dispatcher to a store and
//! exposes the reactive API, including WASM bindings behind the `wasm` feature.
//!
//! # Core Components
//!
//! - `Database`: Engine context owning the store, dispatcher, task queue and monitor
//! - `TransactionExecutor`: Runs one unit of work at a time, rejecting requests while busy
//! - `QueryBinding`: Live, deduplicated result of a query descriptor
//! - `ItemCache`: Batched, reactive fetch of records by primary key
//! - `TransactionMonitor`: Transaction latency statistics
//!
//! # Example
//!
//! ```
//! use ripple_core::{record, schema::StoreSchema};
//! use ripple_database::Database;
//! use ripple_query::{QueryDescriptor, QueryResult, WhereClause};
//!
//! let schema = StoreSchema::new(1).declare("friends", "++id, age").unwrap();
//! let db = Database::new("app", schema);
//!
//! let adults = db.bind(
//!     "friends",
//!     QueryDescriptor::new().where_clause(WhereClause::new("age", "aboveOrEqual", 18)).count(),
//! );
//! db.put("friends", record! { "name" => "Alice", "age" => 25 });
//! db.run_pending().unwrap();
//!
//! assert_eq!(adults.value(), Some(QueryResult::Count(1)));
//! ```

pub mod binding;
pub mod config;
pub mod database;
pub mod executor;
pub mod item_cache;
pub mod monitor;
pub mod mutations;
pub mod projection;
pub mod scheduler;
pub mod stats;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use binding::QueryBinding;
pub use config::DatabaseConfig;
pub use database::{Database, TableSubscription};
pub use executor::{ErrorHandler, Submission, TransactionExecutor, WorkUnit};
pub use item_cache::{ItemCache, ItemCallback, Items};
pub use monitor::{
    Clock, ManualClock, MonitorStats, SystemClock, TransactionMonitor, TransactionRecord,
};
pub use mutations::{Pending, Update};
pub use stats::EngineStats;
#[cfg(feature = "wasm")]
pub use wasm::{JsBinding, JsDatabase, JsTableSubscription};
