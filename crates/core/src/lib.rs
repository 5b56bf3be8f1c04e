//! Ripple Core - Core types and schema definitions for Ripple.
//!
//! This crate provides the foundational types for the Ripple reactive data layer:
//!
//! - `Value`: Runtime values stored in record fields and used as keys and operands
//! - `Record`: A schemaless stored object (field name → value)
//! - `schema`: Table and store declarations (primary key, index fields)
//! - `Error`: Error types for store, compiler and transaction operations
//!
//! # Example
//!
//! ```rust
//! use ripple_core::schema::{StoreSchema, TableBuilder};
//! use ripple_core::{record, Value};
//!
//! let friends = TableBuilder::new("friends")
//!     .unwrap()
//!     .primary_key("id", true)
//!     .unwrap()
//!     .index("age")
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let schema = StoreSchema::new(1).table(friends);
//! assert!(schema.validate().is_ok());
//!
//! let alice = record! { "id" => 1, "name" => "Alice", "age" => 25 };
//! assert_eq!(alice.get("age"), Some(&Value::Int64(25)));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod record;
pub mod schema;
mod value;

pub use error::{Error, Result};
pub use record::Record;
pub use value::Value;
