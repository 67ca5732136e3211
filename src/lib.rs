//! A small single-node record store driven by SQL-like statements.
//!
//! Each table is a schema document plus an append-only JSON-lines row log,
//! with an optional in-memory primary-key index rebuilt when the table is
//! opened. [Database::execute] is the main entry point.

pub mod ast;
pub mod column;
pub mod config;
pub mod data_type;
pub mod database;
pub mod error;
pub mod parser;
pub mod row;
pub mod table;
pub mod tokenizer;
pub mod value;

pub use column::ColumnDef;
pub use config::DatabaseConfig;
pub use data_type::DataType;
pub use database::{Database, ExecuteResult};
pub use error::{DbError, DbResult};
pub use row::Row;
pub use table::{Schema, Table, TableOptions};
pub use value::Value;
