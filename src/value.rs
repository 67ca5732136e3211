use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Represents a single data value stored in the database.
///
/// This enum wraps all supported Rust types into a single type that can be
/// passed around the engine. It includes support for SQL `NULL` values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// represents an empty or missing value.
    Null,
    /// A 64-bit signed integer value.
    Int(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// A UTF-8 string value, wrapped in an [Arc] for cheap cloning.
    Text(Arc<str>),
    /// A boolean value.
    Bool(bool),
}

/// Hashable form of a non-null [Value], used as the primary-key index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Int(i64),
    /// Bit pattern of the float, with `-0.0` folded onto `0.0`.
    Float(u64),
    Text(Arc<str>),
    Bool(bool),
}

/// Converts a literal token from a statement into a typed [Value].
///
/// This never fails: anything that is not `NULL`, a boolean, a quoted string
/// or a number is returned verbatim as a string.
///
/// # Example
/// ```
/// # use minidb::value::{parse_literal, Value};
/// assert_eq!(parse_literal("42"), Value::Int(42));
/// assert_eq!(parse_literal("'Alice'"), Value::Text("Alice".into()));
/// assert_eq!(parse_literal("null"), Value::Null);
/// ```
pub fn parse_literal(token: &str) -> Value {
    let token = token.trim();

    if token.eq_ignore_ascii_case("NULL") {
        return Value::Null;
    }
    if token.eq_ignore_ascii_case("TRUE") {
        return Value::Bool(true);
    }
    if token.eq_ignore_ascii_case("FALSE") {
        return Value::Bool(false);
    }

    if let Some(inner) = strip_quotes(token) {
        return Value::Text(inner.into());
    }

    if token.contains('.') {
        if let Some(f) = parse_finite_float(token) {
            return Value::Float(f);
        }
        if let Ok(i) = token.parse::<i64>() {
            return Value::Int(i);
        }
    } else {
        if let Ok(i) = token.parse::<i64>() {
            return Value::Int(i);
        }
        if let Some(f) = parse_finite_float(token) {
            return Value::Float(f);
        }
    }

    Value::Text(token.into())
}

/// Returns the content of a token wrapped in matching single or double quotes.
fn strip_quotes(token: &str) -> Option<&str> {
    let bytes = token.as_bytes();
    if bytes.len() < 2 {
        return None;
    }
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    if (first == b'\'' || first == b'"') && first == last {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}

pub(crate) fn parse_finite_float(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|f| f.is_finite())
}

impl Value {
    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders the value without statement quoting, as stored in a STRING column.
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format!("{f:?}"),
            Self::Text(s) => s.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// Equality as used by `=` and `!=` predicates.
    ///
    /// Integers and floats compare numerically; any other pair of different
    /// types is unequal. Callers handle `NULL` before getting here.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Int(l), Self::Float(r)) | (Self::Float(r), Self::Int(l)) => (*l as f64) == *r,
            _ => self == other,
        }
    }

    /// Ordering as used by `<`, `>`, `<=` and `>=` predicates.
    ///
    /// Returns `None` when the operands are not comparable: either side is
    /// `NULL`, or the pair is not numeric/numeric or string/string.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(l), Self::Int(r)) => Some(l.cmp(r)),
            (Self::Float(l), Self::Float(r)) => l.partial_cmp(r),
            (Self::Int(l), Self::Float(r)) => (*l as f64).partial_cmp(r),
            (Self::Float(l), Self::Int(r)) => l.partial_cmp(&(*r as f64)),
            (Self::Text(l), Self::Text(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Returns the index key for this value, or `None` for `NULL`.
    pub fn index_key(&self) -> Option<IndexKey> {
        match self {
            Self::Null => None,
            Self::Int(i) => Some(IndexKey::Int(*i)),
            Self::Float(f) => {
                let f = if *f == 0.0 { 0.0 } else { *f };
                Some(IndexKey::Float(f.to_bits()))
            }
            Self::Text(s) => Some(IndexKey::Text(Arc::clone(s))),
            Self::Bool(b) => Some(IndexKey::Bool(*b)),
        }
    }

    /// Builds a value from a JSON value read back from the row log.
    ///
    /// Arrays and objects cannot be produced by this engine; if a log line
    /// carries one anyway it is kept as its JSON text.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Null),
            },
            serde_json::Value::String(s) => Self::Text(s.into()),
            other => Self::Text(other.to_string().into()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from_json)
    }
}
