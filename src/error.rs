//! Error types shared by the parser, the table engine and the coordinator.

use std::io;

use thiserror::Error;

use crate::data_type::DataType;
use crate::value::Value;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors surfaced by [crate::Database::execute] and the table engine.
#[derive(Debug, Error)]
pub enum DbError {
    /// The statement text does not match any supported grammar.
    #[error("parse error: {0}")]
    Parse(String),

    /// The table (or its schema document) does not exist.
    #[error("table '{0}' does not exist")]
    NotFound(String),

    /// A table with the same name already exists.
    #[error("table '{0}' already exists")]
    AlreadyExists(String),

    /// A value could not be coerced to the declared column type.
    #[error("cannot convert {value} to {expected} for column '{column}'")]
    Type {
        column: String,
        value: Value,
        expected: DataType,
    },

    /// A write would give two rows the same primary key.
    #[error("duplicate primary key {value} for column '{column}'")]
    DuplicateKey { column: String, value: Value },

    /// A key lookup was requested on a table without a primary key.
    #[error("table '{0}' has no primary key")]
    NoPrimaryKey(String),

    /// Two operands of an ordering comparison are not comparable.
    #[error("cannot compare {left} {op} {right}")]
    Comparison {
        left: Value,
        op: String,
        right: Value,
    },

    /// The schema itself is malformed (names, duplicate or unknown columns).
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// The configuration file could not be read or written.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error while reading or writing table files.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// A schema document or row could not be (de)serialized.
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl DbError {
    /// Creates a parse error.
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse(reason.into())
    }

    /// Creates a schema validation error.
    pub fn invalid_schema(reason: impl Into<String>) -> Self {
        Self::InvalidSchema(reason.into())
    }

    /// Returns true if the error was caused by the statement or its values
    /// rather than by the storage layer.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Io { .. } | Self::Serialization { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::Type {
            column: "age".into(),
            value: Value::Text("abc".into()),
            expected: DataType::Integer,
        };
        let msg = err.to_string();
        assert!(msg.contains("age"));
        assert!(msg.contains("'abc'"));
        assert!(msg.contains("INTEGER"));

        let err = DbError::DuplicateKey {
            column: "id".into(),
            value: Value::Int(1),
        };
        assert_eq!(err.to_string(), "duplicate primary key 1 for column 'id'");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: DbError = io_err.into();
        assert!(matches!(err, DbError::Io { .. }));
        assert!(!err.is_user_error());
        assert!(DbError::parse("bad").is_user_error());
    }
}
