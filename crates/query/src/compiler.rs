//! The query compiler: turns a descriptor into an executed query against a table.
//!
//! Compilation runs in a fixed order:
//!
//! 1. a non-empty where-tree is composed into the collection (this disables the
//!    index-ordered scan),
//! 2. otherwise an `orderBy` on a declared index routes through an ordered scan,
//! 3. the ad-hoc filter, `reverse`, `offset` and `limit` are applied,
//! 4. the terminal projection is evaluated.

use crate::descriptor::{Projection, QueryDescriptor, WhereClause};
use crate::operator::{Operand, Operator};
use crate::result::QueryResult;
use alloc::string::String;
use ripple_core::Result;
use ripple_storage::{Collection, Table};
use tracing::trace;

/// How a clause attaches to the running query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Join {
    /// Seeds the query; on an already seeded query, starts a fresh union branch.
    Where,
    Or,
    And,
}

/// The running query: a bare table until the first clause narrows it.
enum Query<'t> {
    Table(Table<'t>),
    Collection(Collection<'t>),
}

impl<'t> Query<'t> {
    fn into_collection(self) -> Collection<'t> {
        match self {
            Query::Table(table) => table.to_collection(),
            Query::Collection(collection) => collection,
        }
    }

    fn map(self, f: impl FnOnce(Collection<'t>) -> Collection<'t>) -> Self {
        Query::Collection(f(self.into_collection()))
    }
}

/// Compiles `descriptor` and runs it against `table`.
pub fn compile(table: Table<'_>, descriptor: &QueryDescriptor) -> Result<QueryResult> {
    let index_order = descriptor
        .order_by
        .as_deref()
        .filter(|field| table.schema().is_indexed(field));
    trace!(
        table = table.name(),
        projection = ?descriptor.projection(),
        "compiling query"
    );

    let mut query = match (descriptor.where_clauses(), index_order) {
        (Some(clauses), _) => compose_where(Query::Table(table), clauses, None, false)?,
        (None, Some(field)) => Query::Collection(table.order_by(field)?),
        (None, None) => Query::Table(table),
    };

    if let Some(filter) = descriptor.filter.clone() {
        query = query.map(|c| c.filter(move |record| filter.test(record)));
    }
    if descriptor.reverse {
        query = query.map(Collection::reverse);
    }
    if let Some(n) = descriptor.offset {
        query = query.map(|c| c.offset(n));
    }
    if let Some(n) = descriptor.limit {
        query = query.map(|c| c.limit(n));
    }

    let collection = query.into_collection();
    let result = match descriptor.projection() {
        Projection::Count => QueryResult::Count(collection.count()),
        Projection::PrimaryKeys => QueryResult::Keys(collection.primary_keys()),
        Projection::Erase => QueryResult::Deleted(collection.delete()?),
        Projection::ToArray => QueryResult::Records(collection.to_array()),
        Projection::None => QueryResult::Unmaterialized,
    };
    Ok(result)
}

/// Composes a where-tree into the running query, left to right.
///
/// `force_where` is set while the enclosing clause was "missing" (no field under a
/// `where` join): the clauses below then act as a fresh `where` instead of chaining
/// with `join`, until the first one that contributes something.
fn compose_where<'t>(
    mut query: Query<'t>,
    clauses: &[WhereClause],
    join: Option<Join>,
    mut force_where: bool,
) -> Result<Query<'t>> {
    for clause in clauses {
        let joiner = match join {
            Some(join) if !force_where => join,
            _ => Join::Where,
        };
        let missing =
            joiner == Join::Where && clause.field_name().is_none() && clause.filter.is_none();

        if !missing {
            force_where = false;
            query = apply_clause(query, clause, joiner)?;
        }

        if let Some(or) = &clause.or {
            query = compose_where(query, or, Some(Join::Or), missing)?;
        }
        if let Some(and) = &clause.and {
            query = compose_where(query, and, Some(Join::And), missing)?;
        }
    }
    Ok(query)
}

fn apply_clause<'t>(query: Query<'t>, clause: &WhereClause, joiner: Join) -> Result<Query<'t>> {
    // Custom predicates always intersect, whatever join was requested
    if let Some(filter) = clause.filter.clone() {
        let param = clause.param.clone().unwrap_or_default();
        trace!(?joiner, "and(filter)");
        return Ok(query.map(|c| c.filter(move |record| filter.test(record, &param))));
    }

    let Some(field) = clause.field_name() else {
        return Ok(query);
    };
    let operator: Operator = clause.operator.parse()?;
    let condition = operator.condition(&Operand::coerce(clause.value.as_ref()))?;
    trace!(?joiner, field, %operator, "clause");

    let query = match joiner {
        Join::Where | Join::Or => match query {
            Query::Table(table) => table.where_(field).matching(condition),
            Query::Collection(collection) => collection.or(field).matching(condition),
        },
        Join::And => {
            let field = String::from(field);
            query
                .into_collection()
                .filter(move |record| condition.matches(record.get_path(&field)))
        }
    };
    Ok(Query::Collection(query))
}
