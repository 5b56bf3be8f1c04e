//! Journal for tracking changes in Ripple stores.
//!
//! This module provides the `ChangeRecord` commit notification and the `Journal`
//! that records them within a transaction, so a failed transaction can be undone.

use crate::cache::TableCache;
use alloc::string::String;
use alloc::vec::Vec;
use ripple_core::{Record, Value};

/// The kind of write a change record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A record was created under a new key.
    Create,
    /// An existing record was replaced.
    Update,
    /// A record was deleted.
    Delete,
}

/// A single committed change, as published on the change feed.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeRecord {
    /// Table the change happened in.
    pub table: String,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Primary key of the affected record.
    pub key: Value,
    /// The record after the change (absent for deletes).
    pub obj: Option<Record>,
    /// The record before the change (absent for creates).
    pub old_obj: Option<Record>,
}

impl ChangeRecord {
    /// Creates a change describing a put of `obj` that replaced `old_obj`.
    pub fn put(table: impl Into<String>, key: Value, obj: Record, old_obj: Option<Record>) -> Self {
        let kind = if old_obj.is_some() {
            ChangeKind::Update
        } else {
            ChangeKind::Create
        };
        Self {
            table: table.into(),
            kind,
            key,
            obj: Some(obj),
            old_obj,
        }
    }

    /// Creates a change describing the deletion of `old_obj`.
    pub fn delete(table: impl Into<String>, key: Value, old_obj: Record) -> Self {
        Self {
            table: table.into(),
            kind: ChangeKind::Delete,
            key,
            obj: None,
            old_obj: Some(old_obj),
        }
    }
}

/// Journal for tracking changes within a transaction.
#[derive(Debug, Default)]
pub struct Journal {
    /// Ordered list of entries for replay.
    entries: Vec<ChangeRecord>,
}

impl Journal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Records a put operation.
    pub fn record_put(&mut self, table: &str, key: Value, obj: Record, old_obj: Option<Record>) {
        self.entries.push(ChangeRecord::put(table, key, obj, old_obj));
    }

    /// Records a delete operation.
    pub fn record_delete(&mut self, table: &str, key: Value, old_obj: Record) {
        self.entries.push(ChangeRecord::delete(table, key, old_obj));
    }

    /// Returns all journal entries.
    pub fn entries(&self) -> &[ChangeRecord] {
        &self.entries
    }

    /// Returns the number of recorded changes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finalizes the journal, handing back its entries in write order.
    ///
    /// Changes are already applied to the table stores as they are recorded.
    pub fn commit(&mut self) -> Vec<ChangeRecord> {
        core::mem::take(&mut self.entries)
    }

    /// Undoes the recorded changes against `cache`, newest first.
    pub fn rollback(&mut self, cache: &mut TableCache) {
        for entry in self.entries.drain(..).rev() {
            if let Some(store) = cache.get_table_mut(&entry.table) {
                store.restore(entry.key, entry.old_obj);
            }
        }
    }
}
