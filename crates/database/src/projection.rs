//! Reshaping record lists by an id field.
//!
//! Records without the id field are skipped. When several records share an id
//! the last one wins.

use ripple_core::{Record, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Maps each record's `id_field` value to the record.
pub fn to_map(records: &[Record], id_field: &str) -> BTreeMap<Value, Record> {
    records
        .iter()
        .filter_map(|record| Some((record.get_path(id_field)?.clone(), record.clone())))
        .collect()
}

/// Like [`to_map`], keyed by the id as an object key: strings as is, other
/// values in their display form.
pub fn to_object(records: &[Record], id_field: &str) -> BTreeMap<String, Record> {
    records
        .iter()
        .filter_map(|record| {
            let id = record.get_path(id_field)?;
            let key = match id.as_str() {
                Some(s) => s.to_string(),
                None => id.to_string(),
            };
            Some((key, record.clone()))
        })
        .collect()
}

/// Collects the `id_field` values.
pub fn to_set(records: &[Record], id_field: &str) -> BTreeSet<Value> {
    records
        .iter()
        .filter_map(|record| record.get_path(id_field).cloned())
        .collect()
}
