//! Ripple Query - Query descriptors and the query compiler for Ripple.
//!
//! This crate provides:
//!
//! - `descriptor`: The declarative `QueryDescriptor` and its `WhereClause` tree
//! - `operator`: The closed operator table and operand coercion
//! - `compiler`: Compiles a descriptor against a table and evaluates its projection
//! - `result`: The `QueryResult` of a compiled query
//!
//! # Example
//!
//! ```rust
//! use ripple_core::schema::StoreSchema;
//! use ripple_core::record;
//! use ripple_query::{compile, QueryDescriptor, QueryResult, WhereClause};
//! use ripple_storage::{Store, TransactionMode};
//!
//! let schema = StoreSchema::new(1).declare("friends", "++id, age").unwrap();
//! let mut store = Store::new("app", schema);
//! store.open().unwrap();
//! store
//!     .transaction(TransactionMode::ReadWrite, "friends", |mut table| {
//!         table.bulk_put(vec![record! { "age" => 17 }, record! { "age" => 42 }])
//!     })
//!     .unwrap();
//!
//! let adults = QueryDescriptor::new()
//!     .where_clause(WhereClause::new("age", "aboveOrEqual", 18))
//!     .count();
//! let result = store
//!     .transaction(TransactionMode::ReadOnly, "friends", |table| compile(table, &adults))
//!     .unwrap();
//! assert_eq!(result, QueryResult::Count(1));
//! ```

#![no_std]

extern crate alloc;

pub mod compiler;
pub mod descriptor;
pub mod operator;
pub mod result;

pub use compiler::compile;
pub use descriptor::{ParamPredicate, Projection, QueryDescriptor, RecordPredicate, WhereClause};
pub use operator::{Operand, Operator};
pub use result::QueryResult;
