//! Schema module for Ripple.
//!
//! This module contains the table and store declarations: which tables exist,
//! which field is each table's primary key, and which fields are indexed.

mod store;
mod table;

pub use store::StoreSchema;
pub use table::{TableBuilder, TableSchema};
