use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::{DbError, DbResult};
use crate::value::{Value, parse_finite_float};

/// Column definition in the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// The name of the column.
    pub name: String,
    /// The logical data type of the column.
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Converts a value to this column's declared type.
    ///
    /// `NULL` is accepted for every type.
    ///
    /// # Errors
    /// Returns [DbError::Type] naming the column, the value and the expected
    /// type when the value cannot be represented in the column.
    ///
    /// # Example
    /// ```
    /// # use minidb::{ColumnDef, DataType, Value};
    /// let col = ColumnDef::new("active", DataType::Boolean);
    /// assert_eq!(col.coerce(Value::from("yes")).unwrap(), Value::Bool(true));
    /// assert!(col.coerce(Value::from("maybe")).is_err());
    /// ```
    pub fn coerce(&self, value: Value) -> DbResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let coerced = match self.data_type {
            DataType::String => Some(match value {
                Value::Text(_) => value.clone(),
                ref other => Value::Text(other.to_plain_string().into()),
            }),
            DataType::Integer => match &value {
                Value::Int(i) => Some(Value::Int(*i)),
                Value::Bool(b) => Some(Value::Int(i64::from(*b))),
                Value::Float(f) if fits_i64(*f) => Some(Value::Int(f.trunc() as i64)),
                Value::Text(s) => s.trim().parse::<i64>().ok().map(Value::Int),
                _ => None,
            },
            DataType::Float => match &value {
                Value::Float(f) => Some(Value::Float(*f)),
                Value::Int(i) => Some(Value::Float(*i as f64)),
                Value::Bool(b) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
                Value::Text(s) => parse_finite_float(s.trim()).map(Value::Float),
                Value::Null => None,
            },
            DataType::Boolean => match &value {
                Value::Bool(b) => Some(Value::Bool(*b)),
                Value::Int(1) => Some(Value::Bool(true)),
                Value::Int(0) => Some(Value::Bool(false)),
                Value::Text(s) => parse_bool(s),
                _ => None,
            },
        };

        coerced.ok_or_else(|| self.type_error(value))
    }

    /// Like [ColumnDef::coerce], but refuses to drop the fractional part of a
    /// float headed for an INTEGER column.
    pub fn coerce_exact(&self, value: Value) -> DbResult<Value> {
        let lossy = self.data_type == DataType::Integer
            && matches!(value, Value::Float(f) if f.fract() != 0.0);
        if lossy {
            return Err(self.type_error(value));
        }
        self.coerce(value)
    }

    fn type_error(&self, value: Value) -> DbError {
        DbError::Type {
            column: self.name.clone(),
            value,
            expected: self.data_type,
        }
    }
}

/// True when `f` truncates to a value representable as `i64`.
fn fits_i64(f: f64) -> bool {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    f.is_finite() && f.trunc() >= i64::MIN as f64 && f.trunc() < i64::MAX as f64
}

/// Interprets the usual spellings of a boolean, case-insensitively.
fn parse_bool(text: &str) -> Option<Value> {
    match text.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(Value::Bool(true)),
        "false" | "0" | "no" | "n" => Some(Value::Bool(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_accepted_everywhere() {
        for data_type in [
            DataType::String,
            DataType::Integer,
            DataType::Float,
            DataType::Boolean,
        ] {
            let col = ColumnDef::new("c", data_type);
            assert_eq!(col.coerce(Value::Null).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_coerce_string() {
        let col = ColumnDef::new("name", DataType::String);
        assert_eq!(col.coerce(Value::from("Alice")).unwrap(), Value::from("Alice"));
        assert_eq!(col.coerce(Value::Int(12)).unwrap(), Value::from("12"));
        assert_eq!(col.coerce(Value::Float(2.5)).unwrap(), Value::from("2.5"));
        assert_eq!(col.coerce(Value::Bool(true)).unwrap(), Value::from("true"));
    }

    #[test]
    fn test_coerce_integer() {
        let col = ColumnDef::new("age", DataType::Integer);
        assert_eq!(col.coerce(Value::Int(30)).unwrap(), Value::Int(30));
        assert_eq!(col.coerce(Value::from(" 42 ")).unwrap(), Value::Int(42));
        assert_eq!(col.coerce(Value::Bool(true)).unwrap(), Value::Int(1));
        assert_eq!(col.coerce(Value::Bool(false)).unwrap(), Value::Int(0));
        assert_eq!(col.coerce(Value::Float(3.9)).unwrap(), Value::Int(3));
        assert_eq!(col.coerce(Value::Float(-3.9)).unwrap(), Value::Int(-3));
    }

    #[test]
    fn test_coerce_integer_out_of_range() {
        let col = ColumnDef::new("id", DataType::Integer);
        for f in [1e20, -1e20, 9.3e18, f64::INFINITY, f64::NAN] {
            assert!(
                matches!(col.coerce(Value::Float(f)), Err(DbError::Type { .. })),
                "{f} should not fit"
            );
        }
        assert_eq!(
            col.coerce(Value::Float(-9.223372036854775808e18)).unwrap(),
            Value::Int(i64::MIN)
        );
    }

    #[test]
    fn test_coerce_exact_keeps_fractions() {
        let col = ColumnDef::new("id", DataType::Integer);
        assert_eq!(col.coerce_exact(Value::Float(2.0)).unwrap(), Value::Int(2));
        assert!(col.coerce_exact(Value::Float(2.5)).is_err());
        assert_eq!(col.coerce_exact(Value::from("7")).unwrap(), Value::Int(7));

        let price = ColumnDef::new("price", DataType::Float);
        assert_eq!(price.coerce_exact(Value::Int(3)).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_coerce_integer_failure_names_column() {
        let col = ColumnDef::new("age", DataType::Integer);
        let err = col.coerce(Value::from("abc")).unwrap_err();

        match err {
            DbError::Type {
                column,
                value,
                expected,
            } => {
                assert_eq!(column, "age");
                assert_eq!(value, Value::from("abc"));
                assert_eq!(expected, DataType::Integer);
            }
            other => panic!("Expected type error, got {other:?}"),
        }
    }

    #[test]
    fn test_coerce_float() {
        let col = ColumnDef::new("price", DataType::Float);
        assert_eq!(col.coerce(Value::Int(3)).unwrap(), Value::Float(3.0));
        assert_eq!(col.coerce(Value::from("9.5")).unwrap(), Value::Float(9.5));
        assert!(col.coerce(Value::from("cheap")).is_err());
        assert!(col.coerce(Value::from("inf")).is_err());
    }

    #[test]
    fn test_coerce_boolean() {
        let col = ColumnDef::new("active", DataType::Boolean);
        for text in ["true", "TRUE", "1", "yes", "Y"] {
            assert_eq!(col.coerce(Value::from(text)).unwrap(), Value::Bool(true));
        }
        for text in ["false", "0", "No", "n"] {
            assert_eq!(col.coerce(Value::from(text)).unwrap(), Value::Bool(false));
        }
        assert_eq!(col.coerce(Value::Int(1)).unwrap(), Value::Bool(true));
        assert!(col.coerce(Value::from("maybe")).is_err());
        assert!(col.coerce(Value::Int(7)).is_err());
        assert!(col.coerce(Value::Float(1.0)).is_err());
    }
}
