//! Query descriptors: the declarative form of a query.
//!
//! Descriptors deserialize from JSON with the camelCase keys the host uses
//! (`where`, `orderBy`, `primaryKeys`, `toArray`, ...). Predicates are code and are
//! attached with the builder methods; they never come from JSON.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use ripple_core::{Record, Value};
use serde::{Deserialize, Serialize};

/// A predicate over a whole record, compared by identity.
#[derive(Clone)]
pub struct RecordPredicate(Rc<dyn Fn(&Record) -> bool>);

impl RecordPredicate {
    pub fn new(f: impl Fn(&Record) -> bool + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Evaluates the predicate.
    pub fn test(&self, record: &Record) -> bool {
        (self.0)(record)
    }
}

impl PartialEq for RecordPredicate {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for RecordPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordPredicate({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// A predicate over a record and the clause's `param`, compared by identity.
#[derive(Clone)]
pub struct ParamPredicate(Rc<dyn Fn(&Record, &Value) -> bool>);

impl ParamPredicate {
    pub fn new(f: impl Fn(&Record, &Value) -> bool + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Evaluates the predicate.
    pub fn test(&self, record: &Record, param: &Value) -> bool {
        (self.0)(record, param)
    }
}

impl PartialEq for ParamPredicate {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for ParamPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParamPredicate({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// One node of a where-tree.
///
/// A node is either a leaf comparison (`field` + `operator` + `value`) or a custom
/// predicate (`filter` + `param`), and may carry `or`/`and` sub-trees that compile
/// against the same running query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhereClause {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<Value>,
    #[serde(skip)]
    pub filter: Option<ParamPredicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<WhereClause>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<WhereClause>>,
}

impl WhereClause {
    /// Creates a leaf comparison.
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: Some(field.into()),
            operator: operator.into(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Creates a custom predicate node evaluated with `param`.
    pub fn predicate(
        filter: impl Fn(&Record, &Value) -> bool + 'static,
        param: impl Into<Value>,
    ) -> Self {
        Self {
            filter: Some(ParamPredicate::new(filter)),
            param: Some(param.into()),
            ..Self::default()
        }
    }

    /// Creates a node without a comparison, only carrying sub-trees.
    pub fn group() -> Self {
        Self::default()
    }

    /// Attaches an `or` sub-tree.
    pub fn or(mut self, clauses: Vec<WhereClause>) -> Self {
        self.or = Some(clauses);
        self
    }

    /// Attaches an `and` sub-tree.
    pub fn and(mut self, clauses: Vec<WhereClause>) -> Self {
        self.and = Some(clauses);
        self
    }

    /// Returns the field, treating an empty name as absent.
    pub fn field_name(&self) -> Option<&str> {
        self.field.as_deref().filter(|f| !f.is_empty())
    }
}

/// The terminal projection a descriptor selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    Count,
    PrimaryKeys,
    Erase,
    ToArray,
    /// No terminal: the query is built but not materialized.
    None,
}

/// A declarative query against one table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryDescriptor {
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_: Option<Vec<WhereClause>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    pub reverse: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip)]
    pub filter: Option<RecordPredicate>,
    pub count: bool,
    pub primary_keys: bool,
    pub erase: bool,
    pub to_array: bool,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            where_: None,
            order_by: None,
            reverse: false,
            offset: None,
            limit: None,
            filter: None,
            count: false,
            primary_keys: false,
            erase: false,
            to_array: true,
        }
    }
}

impl QueryDescriptor {
    /// Creates a descriptor selecting every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a top-level where clause.
    pub fn where_clause(mut self, clause: WhereClause) -> Self {
        self.where_.get_or_insert_with(Vec::new).push(clause);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Sets the ad-hoc filter applied after the where-tree.
    pub fn filter(mut self, f: impl Fn(&Record) -> bool + 'static) -> Self {
        self.filter = Some(RecordPredicate::new(f));
        self
    }

    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn primary_keys(mut self) -> Self {
        self.primary_keys = true;
        self
    }

    pub fn erase(mut self) -> Self {
        self.erase = true;
        self
    }

    pub fn to_array(mut self, to_array: bool) -> Self {
        self.to_array = to_array;
        self
    }

    /// Returns the where-tree, if it has any clause.
    pub fn where_clauses(&self) -> Option<&[WhereClause]> {
        self.where_.as_deref().filter(|w| !w.is_empty())
    }

    /// Returns the terminal projection, by priority
    /// `count` > `primaryKeys` > `erase` > `toArray`.
    pub fn projection(&self) -> Projection {
        if self.count {
            Projection::Count
        } else if self.primary_keys {
            Projection::PrimaryKeys
        } else if self.erase {
            Projection::Erase
        } else if self.to_array {
            Projection::ToArray
        } else {
            Projection::None
        }
    }

    /// Returns true if running the descriptor writes to the table.
    pub fn is_write(&self) -> bool {
        self.projection() == Projection::Erase
    }
}
