use std::fmt;

use serde::{Deserialize, Serialize};

/// Represents the supported data types in the database schema.
/// These types define the structure of columns and the expected format of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// A variable-length UTF-8 character string.
    #[serde(alias = "str", alias = "string", alias = "text", alias = "TEXT")]
    String,
    /// A 64-bit signed integer.
    #[serde(alias = "int", alias = "integer", alias = "INT")]
    Integer,
    /// A 64-bit floating-point number.
    #[serde(alias = "float")]
    Float,
    /// A boolean value (true or false).
    #[serde(alias = "bool", alias = "boolean", alias = "BOOL")]
    Boolean,
}

impl DataType {
    /// Resolves a type keyword from a `CREATE TABLE` column definition.
    ///
    /// Keywords are matched case-insensitively and a `(n)` size suffix is
    /// ignored. Unknown keywords are accepted as opaque type names and stored
    /// as [DataType::String].
    pub fn from_keyword(keyword: &str) -> Self {
        let base = keyword.split_once('(').map_or(keyword, |(base, _)| base).trim();

        match base.to_uppercase().as_str() {
            "INT" | "INTEGER" | "BIGINT" | "SMALLINT" => Self::Integer,
            "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" | "NUMERIC" => Self::Float,
            "BOOL" | "BOOLEAN" => Self::Boolean,
            _ => Self::String,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
        };
        f.write_str(name)
    }
}
