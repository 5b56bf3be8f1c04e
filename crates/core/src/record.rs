//! Record structure for Ripple.
//!
//! A `Record` is one stored object: an ordered map from field name to `Value`.
//! Records are schemaless; only the primary key field and the declared index
//! fields of a table carry meaning for the engine.

use crate::value::Value;
use alloc::collections::btree_map::{self, BTreeMap};
use alloc::string::String;
use serde::{Deserialize, Serialize};

/// A stored record.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record from an existing field map.
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Gets a top-level field.
    #[inline]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Gets a field by dotted path, descending into nested objects.
    ///
    /// `"address.city"` reads `city` inside the `address` object.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Sets a top-level field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Builder-style `set`.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Removes a top-level field.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns true if the record has the field.
    #[inline]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the number of top-level fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates the fields in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Returns the underlying field map.
    #[inline]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Consumes the record into its field map.
    pub fn into_fields(self) -> BTreeMap<String, Value> {
        self.fields
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.fields)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Builds a [`Record`] from `field => value` pairs.
///
/// ```rust
/// use ripple_core::{record, Value};
///
/// let r = record! { "id" => 1, "name" => "Alice" };
/// assert_eq!(r.get("id"), Some(&Value::Int64(1)));
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($field:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $(record.set($field, $value);)+
        record
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn test_record_get_set() {
        let mut r = Record::new();
        assert!(r.is_empty());
        assert_eq!(r.set("id", 1), None);
        assert_eq!(r.set("id", 2), Some(Value::Int64(1)));
        assert_eq!(r.get("id"), Some(&Value::Int64(2)));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_record_macro() {
        let r = record! { "id" => 1, "a" => 5 };
        assert_eq!(r.get("a"), Some(&Value::Int64(5)));
        assert!(record!().is_empty());
    }

    #[test]
    fn test_record_get_path() {
        let address = record! { "city" => "Oslo" };
        let r = record! { "id" => 1, "address" => address };
        assert_eq!(r.get_path("address.city"), Some(&Value::String("Oslo".into())));
        assert_eq!(r.get_path("address.zip"), None);
        assert_eq!(r.get_path("id"), Some(&Value::Int64(1)));
    }

    #[test]
    fn test_record_deep_equality() {
        let a = record! { "id" => 1, "tags" => Value::Array(alloc::vec!["x".into()]) };
        let b = record! { "tags" => Value::Array(alloc::vec!["x".into()]), "id" => 1 };
        assert_eq!(a, b);
        assert_ne!(a, b.with("id", 2));
    }

    #[test]
    fn test_record_serde_is_plain_object() {
        let r: Record = serde_json::from_str(r#"{"id":3,"a":5}"#).unwrap();
        assert_eq!(r, record! { "id" => 3, "a" => 5 });
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"a":5,"id":3}"#);
    }
}
