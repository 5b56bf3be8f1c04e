//! Query results.

use alloc::vec::Vec;
use ripple_core::{Record, Value};
use serde::Serialize;

/// The outcome of a compiled query, shaped by its terminal projection.
///
/// `PartialEq` is the deep-equality check used to suppress redundant updates.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    /// Matched records (`toArray`).
    Records(Vec<Record>),
    /// Number of matched records (`count`).
    Count(usize),
    /// Primary keys of matched records (`primaryKeys`).
    Keys(Vec<Value>),
    /// Number of deleted records (`erase`).
    Deleted(usize),
    /// The query was built but not materialized.
    Unmaterialized,
}

impl QueryResult {
    /// Returns the records of a `Records` result.
    pub fn records(&self) -> Option<&[Record]> {
        match self {
            QueryResult::Records(records) => Some(records),
            _ => None,
        }
    }

    /// Consumes the result into its records.
    pub fn into_records(self) -> Option<Vec<Record>> {
        match self {
            QueryResult::Records(records) => Some(records),
            _ => None,
        }
    }

    /// Returns the keys of a `Keys` result.
    pub fn keys(&self) -> Option<&[Value]> {
        match self {
            QueryResult::Keys(keys) => Some(keys),
            _ => None,
        }
    }

    /// Returns the number carried by `Count` and `Deleted` results.
    pub fn count(&self) -> Option<usize> {
        match self {
            QueryResult::Count(n) | QueryResult::Deleted(n) => Some(*n),
            _ => None,
        }
    }
}
