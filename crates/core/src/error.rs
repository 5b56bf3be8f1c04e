//! Error types for Ripple.

use alloc::boxed::Box;
use alloc::string::String;
use thiserror::Error;

/// Result type alias for Ripple operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for store, compiler and transaction operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The store could not be opened.
    #[error("Store could not be opened: {reason}")]
    StoreNotOpenable { reason: String },
    /// A transaction was started against a closed store.
    #[error("Store is closed")]
    StoreClosed,
    /// A query or mutation failed inside a transaction.
    #[error("Transaction {table}: {cause}")]
    TransactionFailed { table: String, cause: Box<Error> },
    /// The compiler could not resolve a comparison operator.
    #[error("Invalid operator: {operator}")]
    InvalidOperator { operator: String },
    /// The operator was resolved but its operand does not fit.
    #[error("Invalid operand for {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },
    /// Table not found.
    #[error("Table not found: {name}")]
    TableNotFound { name: String },
    /// Invalid schema definition.
    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },
    /// A record was written without a usable primary key.
    #[error("Record has no primary key for table {table}")]
    MissingKey { table: String },
    /// A write was attempted inside a read-only transaction.
    #[error("Write attempted in read-only transaction on {table}")]
    ReadOnlyTransaction { table: String },
    /// Invalid operation.
    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

impl Error {
    /// Creates a store-not-openable error.
    pub fn store_not_openable(reason: impl Into<String>) -> Self {
        Error::StoreNotOpenable {
            reason: reason.into(),
        }
    }

    /// Wraps `cause` as a transaction failure on `table`.
    ///
    /// Errors that already carry a table tag, and open failures, pass through unchanged.
    pub fn transaction_failed(table: impl Into<String>, cause: Error) -> Self {
        match cause {
            Error::TransactionFailed { .. } | Error::StoreNotOpenable { .. } => cause,
            cause => Error::TransactionFailed {
                table: table.into(),
                cause: Box::new(cause),
            },
        }
    }

    /// Creates an invalid operator error.
    pub fn invalid_operator(operator: impl Into<String>) -> Self {
        Error::InvalidOperator {
            operator: operator.into(),
        }
    }

    /// Creates an invalid operand error.
    pub fn invalid_operand(operator: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidOperand {
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a missing key error.
    pub fn missing_key(table: impl Into<String>) -> Self {
        Error::MissingKey {
            table: table.into(),
        }
    }

    /// Creates a read-only transaction error.
    pub fn read_only(table: impl Into<String>) -> Self {
        Error::ReadOnlyTransaction {
            table: table.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the innermost cause of a transaction failure, or `self`.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::TransactionFailed { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_operator("sortaEquals");
        assert!(err.to_string().contains("sortaEquals"));

        let err = Error::table_not_found("users");
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_transaction_failed_tags_table_and_cause() {
        let err = Error::transaction_failed("friends", Error::read_only("friends"));
        assert_eq!(
            err.to_string(),
            "Transaction friends: Write attempted in read-only transaction on friends"
        );
        assert_eq!(err.root_cause(), &Error::read_only("friends"));
    }

    #[test]
    fn test_transaction_failed_does_not_double_wrap() {
        let inner = Error::transaction_failed("a", Error::StoreClosed);
        let outer = Error::transaction_failed("b", inner.clone());
        assert_eq!(outer, inner);

        let open = Error::store_not_openable("blocked");
        assert_eq!(Error::transaction_failed("a", open.clone()), open);
    }
}
