//! Primitive query builder: where-clauses and collections.
//!
//! A `Collection` is an ordered list of steps evaluated against one table:
//!
//! - a match step selects records whose field satisfies a [`Condition`]; the first one
//!   seeds the selection and every later one adds a union branch,
//! - a filter step keeps only the currently selected records accepted by a predicate.
//!
//! A collection without match steps scans the table in primary-key order (or index
//! order after `order_by`). A collection seeded by a single match step is ordered by
//! the matched field, then primary key; unions come back in primary-key order.
//! `reverse`, `offset` and `limit` are applied last, in that order.

use crate::condition::Condition;
use crate::table::Table;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::{Record, Result, Value};

type Predicate<'t> = Box<dyn Fn(&Record) -> bool + 't>;

enum Step<'t> {
    Match { field: String, condition: Condition },
    Filter(Predicate<'t>),
}

/// A lazily evaluated selection of records from one table.
pub struct Collection<'t> {
    table: Table<'t>,
    /// Index field from `order_by`, used when no match step exists.
    order: Option<String>,
    steps: Vec<Step<'t>>,
    reverse: bool,
    offset: usize,
    limit: Option<usize>,
}

impl<'t> Collection<'t> {
    pub(crate) fn new(table: Table<'t>) -> Self {
        Self {
            table,
            order: None,
            steps: Vec::new(),
            reverse: false,
            offset: 0,
            limit: None,
        }
    }

    pub(crate) fn ordered_by(table: Table<'t>, field: String) -> Self {
        let mut collection = Self::new(table);
        collection.order = Some(field);
        collection
    }

    pub(crate) fn where_(self, field: impl Into<String>) -> WhereClause<'t> {
        WhereClause {
            collection: self,
            field: field.into(),
        }
    }

    /// Starts a union branch on `field`.
    ///
    /// On a collection with no match step yet, the branch seeds the selection instead.
    pub fn or(self, field: impl Into<String>) -> WhereClause<'t> {
        self.where_(field)
    }

    /// Keeps only the currently selected records accepted by `predicate`.
    pub fn filter(mut self, predicate: impl Fn(&Record) -> bool + 't) -> Self {
        self.steps.push(Step::Filter(Box::new(predicate)));
        self
    }

    /// Reverses the result order.
    pub fn reverse(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }

    /// Skips the first `n` results.
    pub fn offset(mut self, n: usize) -> Self {
        self.offset = n;
        self
    }

    /// Returns at most `n` results.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    fn push_match(mut self, field: String, condition: Condition) -> Self {
        self.steps.push(Step::Match { field, condition });
        self
    }

    fn accepted_by_filters(&self, record: &Record) -> bool {
        self.steps.iter().all(|step| match step {
            Step::Filter(predicate) => predicate(record),
            Step::Match { .. } => true,
        })
    }

    /// Evaluates the steps, returning `(key, record)` pairs in result order.
    fn select(&self) -> Vec<(&Value, &Record)> {
        let store = self.table.store();
        let has_match = self
            .steps
            .iter()
            .any(|step| matches!(step, Step::Match { .. }));

        let mut selected: Vec<(&Value, &Record)> = if !has_match {
            let base: Vec<(&Value, &Record)> = match &self.order {
                Some(field) => store.scan_by(field),
                None => store.scan().collect(),
            };
            base.into_iter()
                .filter(|(_, record)| self.accepted_by_filters(record))
                .collect()
        } else {
            let mut current: Option<BTreeMap<&Value, &Record>> = None;
            let mut branches = 0usize;
            for step in &self.steps {
                match step {
                    Step::Match { field, condition } => {
                        branches += 1;
                        let set = current.get_or_insert_with(BTreeMap::new);
                        for (key, record) in store.scan() {
                            if condition.matches(record.get_path(field)) {
                                set.insert(key, record);
                            }
                        }
                    }
                    Step::Filter(predicate) => match current.as_mut() {
                        Some(set) => set.retain(|_, record| predicate(*record)),
                        None => {
                            current = Some(
                                store
                                    .scan()
                                    .filter(|(_, record)| predicate(*record))
                                    .collect(),
                            );
                        }
                    },
                }
            }

            let mut selected: Vec<(&Value, &Record)> =
                current.unwrap_or_default().into_iter().collect();
            // A collection seeded by one match step reads in that field's index order
            if let (1, Some(Step::Match { field, .. })) = (branches, self.steps.first()) {
                selected.sort_by(|a, b| {
                    a.1.get_path(field)
                        .cmp(&b.1.get_path(field))
                        .then_with(|| a.0.cmp(b.0))
                });
            }
            selected
        };

        if self.reverse {
            selected.reverse();
        }
        let limit = self.limit.unwrap_or(usize::MAX);
        selected.into_iter().skip(self.offset).take(limit).collect()
    }

    /// Returns the number of selected records.
    pub fn count(&self) -> usize {
        self.select().len()
    }

    /// Returns the primary keys of the selected records.
    pub fn primary_keys(&self) -> Vec<Value> {
        self.select().into_iter().map(|(key, _)| key.clone()).collect()
    }

    /// Returns the selected records.
    pub fn to_array(&self) -> Vec<Record> {
        self.select()
            .into_iter()
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Returns the first selected record.
    pub fn first(&self) -> Option<Record> {
        self.select().first().map(|(_, record)| (*record).clone())
    }

    /// Deletes the selected records, returning how many were removed.
    pub fn delete(mut self) -> Result<usize> {
        let keys = self.primary_keys();
        let mut removed = 0;
        for key in &keys {
            if self.table.delete(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// A pending match step on one field; an operator method completes it.
pub struct WhereClause<'t> {
    collection: Collection<'t>,
    field: String,
}

impl<'t> WhereClause<'t> {
    /// Returns the field this clause matches on.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Completes the clause with an arbitrary condition.
    pub fn matching(self, condition: Condition) -> Collection<'t> {
        self.collection.push_match(self.field, condition)
    }

    pub fn equals(self, value: impl Into<Value>) -> Collection<'t> {
        self.matching(Condition::Equals(value.into()))
    }

    pub fn not_equal(self, value: impl Into<Value>) -> Collection<'t> {
        self.matching(Condition::NotEqual(value.into()))
    }

    pub fn above(self, value: impl Into<Value>) -> Collection<'t> {
        self.matching(Condition::Above(value.into()))
    }

    pub fn above_or_equal(self, value: impl Into<Value>) -> Collection<'t> {
        self.matching(Condition::AboveOrEqual(value.into()))
    }

    pub fn below(self, value: impl Into<Value>) -> Collection<'t> {
        self.matching(Condition::Below(value.into()))
    }

    pub fn below_or_equal(self, value: impl Into<Value>) -> Collection<'t> {
        self.matching(Condition::BelowOrEqual(value.into()))
    }

    /// Matches values between `lower` and `upper`.
    pub fn between(
        self,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        include_lower: bool,
        include_upper: bool,
    ) -> Collection<'t> {
        self.matching(Condition::Between {
            lower: lower.into(),
            upper: upper.into(),
            include_lower,
            include_upper,
        })
    }

    pub fn any_of(self, values: Vec<Value>) -> Collection<'t> {
        self.matching(Condition::AnyOf(values))
    }

    pub fn none_of(self, values: Vec<Value>) -> Collection<'t> {
        self.matching(Condition::NoneOf(values))
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Collection<'t> {
        self.matching(Condition::StartsWith(prefix.into()))
    }

    pub fn starts_with_any_of(self, prefixes: Vec<String>) -> Collection<'t> {
        self.matching(Condition::StartsWithAnyOf(prefixes))
    }

    pub fn equals_ignore_case(self, value: impl Into<String>) -> Collection<'t> {
        self.matching(Condition::EqualsIgnoreCase(value.into()))
    }

    pub fn any_of_ignore_case(self, values: Vec<String>) -> Collection<'t> {
        self.matching(Condition::AnyOfIgnoreCase(values))
    }

    pub fn starts_with_ignore_case(self, prefix: impl Into<String>) -> Collection<'t> {
        self.matching(Condition::StartsWithIgnoreCase(prefix.into()))
    }

    pub fn starts_with_any_of_ignore_case(self, prefixes: Vec<String>) -> Collection<'t> {
        self.matching(Condition::StartsWithAnyOfIgnoreCase(prefixes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TableCache;
    use crate::transaction::{Transaction, TransactionMode};
    use alloc::vec;
    use ripple_core::record;
    use ripple_core::schema::TableSchema;

    fn seeded() -> TableCache {
        let mut cache = TableCache::new();
        cache
            .create_table(TableSchema::parse("friends", "++id,a,name").unwrap())
            .unwrap();
        let store = cache.get_table_mut("friends").unwrap();
        store.put(record! { "id" => 1, "a" => 5, "name" => "Carol" }, None).unwrap();
        store.put(record! { "id" => 2, "a" => 9, "name" => "alice" }, None).unwrap();
        store.put(record! { "id" => 3, "a" => 5, "name" => "Bob" }, None).unwrap();
        store.put(record! { "id" => 4, "a" => 1 }, None).unwrap();
        cache
    }

    fn with_table<T>(cache: &mut TableCache, work: impl FnOnce(Table<'_>) -> T) -> T {
        let store = cache.get_table_mut("friends").unwrap();
        let mut tx = Transaction::begin("friends", TransactionMode::ReadWrite);
        work(Table::new(store, &mut tx))
    }

    fn ids(keys: Vec<Value>) -> Vec<i64> {
        keys.into_iter().filter_map(|k| k.as_i64()).collect()
    }

    #[test]
    fn test_where_equals() {
        let mut cache = seeded();
        let records = with_table(&mut cache, |table| table.where_("a").equals(5).to_array());
        assert_eq!(
            records,
            vec![
                record! { "id" => 1, "a" => 5, "name" => "Carol" },
                record! { "id" => 3, "a" => 5, "name" => "Bob" },
            ]
        );
    }

    #[test]
    fn test_single_branch_reads_in_index_order() {
        let mut cache = seeded();
        let keys = with_table(&mut cache, |table| table.where_("a").above(1).primary_keys());
        assert_eq!(ids(keys), vec![1, 3, 2]);
    }

    #[test]
    fn test_union_reads_in_primary_key_order() {
        let mut cache = seeded();
        let keys = with_table(&mut cache, |table| {
            table
                .where_("a")
                .equals(9)
                .or("a")
                .equals(1)
                .or("id")
                .equals(1)
                .primary_keys()
        });
        assert_eq!(ids(keys), vec![1, 2, 4]);
    }

    #[test]
    fn test_filter_intersects_current_selection() {
        let mut cache = seeded();
        let keys = with_table(&mut cache, |table| {
            table
                .where_("a")
                .equals(5)
                .filter(|r| r.get("name") == Some(&Value::from("Bob")))
                .primary_keys()
        });
        assert_eq!(ids(keys), vec![3]);
    }

    #[test]
    fn test_filter_then_union() {
        let mut cache = seeded();
        let keys = with_table(&mut cache, |table| {
            table
                .filter(|r| r.get("a") == Some(&Value::Int64(9)))
                .or("id")
                .equals(4)
                .primary_keys()
        });
        assert_eq!(ids(keys), vec![2, 4]);
    }

    #[test]
    fn test_order_by_reverse_offset_limit() {
        let mut cache = seeded();
        let keys = with_table(&mut cache, |table| {
            table
                .order_by("a")
                .unwrap()
                .reverse()
                .offset(1)
                .limit(2)
                .primary_keys()
        });
        // a: 9(2), 5(3), 5(1), 1(4) reversed
        assert_eq!(ids(keys), vec![3, 1]);
    }

    #[test]
    fn test_order_by_skips_records_missing_the_field() {
        let mut cache = seeded();
        let count = with_table(&mut cache, |table| table.order_by("name").unwrap().count());
        assert_eq!(count, 3);
    }

    #[test]
    fn test_string_operators() {
        let mut cache = seeded();
        let keys = with_table(&mut cache, |table| {
            table
                .where_("name")
                .starts_with_any_of_ignore_case(vec!["a".into(), "b".into()])
                .primary_keys()
        });
        // index order on name: "Bob" < "alice"
        assert_eq!(ids(keys), vec![3, 2]);
    }

    #[test]
    fn test_first_and_count() {
        let mut cache = seeded();
        with_table(&mut cache, |table| {
            let collection = table.where_("a").between(1, 5, false, true);
            assert_eq!(collection.count(), 2);
            assert_eq!(collection.first().unwrap().get("id"), Some(&Value::Int64(1)));
        });
    }

    #[test]
    fn test_collection_delete() {
        let mut cache = seeded();
        let removed = with_table(&mut cache, |table| {
            table.where_("a").any_of(vec![5.into(), 1.into()]).delete().unwrap()
        });
        assert_eq!(removed, 3);
        assert_eq!(cache.get_table("friends").unwrap().len(), 1);
    }

    #[test]
    fn test_seeded_with_no_matches_is_empty() {
        let mut cache = seeded();
        let count = with_table(&mut cache, |table| table.where_("a").equals(42).count());
        assert_eq!(count, 0);
    }
}
