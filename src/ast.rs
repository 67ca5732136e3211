use std::fmt;

use crate::Value;

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTable {
        name: String,
        columns: Vec<ColumnSpec>,
        primary_key: Option<String>,
    },
    DropTable {
        name: String,
        if_exists: bool,
    },
    Insert {
        name: String,
        /// Column → literal, in the order the statement listed them.
        values: Vec<(String, Value)>,
    },
    Select {
        name: String,
        /// Empty means `*`.
        columns: Vec<String>,
        predicates: Vec<Predicate>,
        limit: Option<usize>,
    },
    Update {
        name: String,
        set: Vec<(String, Value)>,
        predicates: Vec<Predicate>,
    },
    Delete {
        name: String,
        predicates: Vec<Predicate>,
    },
    ShowTables,
    Describe {
        name: String,
    },
}

/// A column as written in `CREATE TABLE`, before its type keyword is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
}

impl ComparisonOp {
    /// Operators in matching priority: two-character forms come first so
    /// `>=` is never read as `>` followed by `=`.
    pub const ALL: [ComparisonOp; 6] = [
        ComparisonOp::NotEq,
        ComparisonOp::GtEq,
        ComparisonOp::LtEq,
        ComparisonOp::Eq,
        ComparisonOp::Gt,
        ComparisonOp::Lt,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::GtEq => ">=",
            Self::LtEq => "<=",
        }
    }

    /// Returns true for `<`, `>`, `<=` and `>=`.
    pub fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::NotEq)
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One `column op literal` conjunct of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub op: ComparisonOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: ComparisonOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }
}
