//! Integration tests for descriptor compilation against a live store.

use ripple_core::schema::StoreSchema;
use ripple_core::{record, Record, Result, Value};
use ripple_query::{compile, QueryDescriptor, QueryResult, WhereClause};
use ripple_storage::{Store, TransactionMode};

/// Creates a store with the three-record `t` table used throughout.
fn create_store() -> Store {
    let schema = StoreSchema::new(1).declare("t", "id, a").unwrap();
    let mut store = Store::new("scenarios", schema);
    store.open().unwrap();
    store
        .transaction(TransactionMode::ReadWrite, "t", |mut table| {
            table.bulk_put(vec![
                record! { "id" => 1, "a" => 5 },
                record! { "id" => 2, "a" => 9 },
                record! { "id" => 3, "a" => 5 },
            ])
        })
        .unwrap();
    store
}

fn run(store: &mut Store, descriptor: &QueryDescriptor) -> Result<QueryResult> {
    let mode = if descriptor.is_write() {
        TransactionMode::ReadWrite
    } else {
        TransactionMode::ReadOnly
    };
    store.transaction(mode, "t", |table| compile(table, descriptor))
}

#[test]
fn test_where_equals_selects_matching_records() {
    let mut store = create_store();
    let descriptor: QueryDescriptor =
        serde_json::from_str(r#"{"where":[{"field":"a","operator":"equals","value":5}]}"#).unwrap();

    assert_eq!(
        run(&mut store, &descriptor).unwrap(),
        QueryResult::Records(vec![
            record! { "id" => 1, "a" => 5 },
            record! { "id" => 3, "a" => 5 },
        ])
    );
}

#[test]
fn test_sibling_clause_with_empty_or_unions() {
    let mut store = create_store();
    let descriptor = QueryDescriptor::new()
        .where_clause(WhereClause::new("a", "equals", 5))
        .where_clause(WhereClause::new("a", "equals", 9).or(vec![]));

    assert_eq!(
        run(&mut store, &descriptor).unwrap(),
        QueryResult::Records(vec![
            record! { "id" => 1, "a" => 5 },
            record! { "id" => 2, "a" => 9 },
            record! { "id" => 3, "a" => 5 },
        ])
    );
}

#[test]
fn test_string_operand_is_coerced() {
    let mut store = create_store();
    let descriptor = QueryDescriptor::new()
        .where_clause(WhereClause::new("a", "anyOf", "9, 5"))
        .count();
    assert_eq!(run(&mut store, &descriptor).unwrap(), QueryResult::Count(3));
}

#[test]
fn test_point_reads_of_primary_keys_equal_to_array() {
    let mut store = create_store();
    let base = QueryDescriptor::new()
        .order_by("a")
        .reverse()
        .filter(|r| r.get("id") != Some(&Value::Int64(2)))
        .limit(5);

    let records = run(&mut store, &base).unwrap();
    let keys = run(&mut store, &base.clone().primary_keys()).unwrap();
    let fetched: Vec<Record> = store
        .transaction(TransactionMode::ReadOnly, "t", |table| {
            Ok(keys
                .keys()
                .unwrap()
                .iter()
                .filter_map(|key| table.get(key))
                .collect())
        })
        .unwrap();

    assert_eq!(QueryResult::Records(fetched), records);
}

#[test]
fn test_erase_then_count() {
    let mut store = create_store();
    let erase = QueryDescriptor::new()
        .where_clause(WhereClause::new("a", "below", 6))
        .erase();
    assert_eq!(run(&mut store, &erase).unwrap(), QueryResult::Deleted(2));
    assert_eq!(
        run(&mut store, &QueryDescriptor::new().count()).unwrap(),
        QueryResult::Count(1)
    );
}
