use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::ast::Command;
use crate::column::ColumnDef;
use crate::config::DatabaseConfig;
use crate::data_type::DataType;
use crate::error::{DbError, DbResult};
use crate::parser::parse;
use crate::row::Row;
use crate::table::{Schema, Table, TableOptions};
use crate::tokenizer::is_identifier;
use crate::value::Value;

/// The entry point of the store.
///
/// It owns the on-disk layout (one schema document and one row log per
/// table), keeps a cache of opened [Table] engines and turns statement text
/// into engine calls.
pub struct Database {
    config: DatabaseConfig,
    /// Engines opened so far, by table name.
    tables: HashMap<String, Table>,
}

/// The outcome of a successful [Database::execute] call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteResult {
    Created { table: String },
    Dropped { table: String },
    Inserted { table: String, row: Row },
    Selected {
        table: String,
        /// Names of the projected columns, in output order.
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    Updated { table: String, count: usize },
    Deleted { table: String, count: usize },
    Tables(Vec<String>),
    Schema(Schema),
}

impl ExecuteResult {
    /// Number of rows returned or affected by the statement.
    pub fn count(&self) -> usize {
        match self {
            Self::Inserted { .. } => 1,
            Self::Selected { rows, .. } => rows.len(),
            Self::Updated { count, .. } | Self::Deleted { count, .. } => *count,
            Self::Tables(names) => names.len(),
            Self::Created { .. } | Self::Dropped { .. } | Self::Schema(_) => 0,
        }
    }

    /// A one-line human-readable summary.
    pub fn message(&self) -> String {
        match self {
            Self::Created { table } => format!("Table '{table}' created."),
            Self::Dropped { table } => format!("Table '{table}' dropped."),
            Self::Inserted { table, .. } => format!("1 row inserted into '{table}'."),
            Self::Selected { rows, .. } => plural(rows.len(), "returned"),
            Self::Updated { count, .. } => plural(*count, "updated"),
            Self::Deleted { count, .. } => plural(*count, "deleted"),
            Self::Tables(names) => match names.len() {
                1 => "1 table.".to_string(),
                n => format!("{n} tables."),
            },
            Self::Schema(schema) => format!(
                "Table '{}' has {} column(s).",
                schema.table_name,
                schema.columns.len()
            ),
        }
    }
}

fn plural(count: usize, verb: &str) -> String {
    match count {
        1 => format!("1 row {verb}."),
        n => format!("{n} rows {verb}."),
    }
}

impl Database {
    /// Opens (or initialises) the database described by `config`, creating
    /// its data and metadata directories.
    pub fn open(config: DatabaseConfig) -> DbResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        fs::create_dir_all(config.effective_metadata_dir())?;

        info!(
            data_dir = %config.data_dir.display(),
            metadata_dir = %config.effective_metadata_dir().display(),
            "database opened"
        );

        Ok(Self {
            config,
            tables: HashMap::new(),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Creates a new table and its empty row log.
    ///
    /// # Errors
    /// - [DbError::InvalidSchema] if a name is invalid or the key column is
    ///   not declared.
    /// - [DbError::AlreadyExists] if the table's schema document exists.
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<ColumnDef>,
        primary_key: Option<String>,
    ) -> DbResult<&mut Table> {
        let schema = Schema::new(name, columns, primary_key)?;

        let schema_path = self.schema_path(name);
        if schema_path.exists() {
            return Err(DbError::AlreadyExists(name.to_string()));
        }

        fs::write(&schema_path, serde_json::to_string_pretty(&schema)?)?;
        let table = Table::create(schema, self.log_path(name), self.table_options())?;

        info!(table = name, "table created");
        self.tables.insert(name.to_string(), table);
        self.get_table(name)
    }

    /// Drops a table: its cached engine, its schema document, then its row
    /// log. Returns whether a table was removed.
    ///
    /// # Errors
    /// Returns [DbError::NotFound] if the table does not exist, unless
    /// `if_exists` is set.
    pub fn drop_table(&mut self, name: &str, if_exists: bool) -> DbResult<bool> {
        self.tables.remove(name);

        let schema_path = self.schema_path(name);
        if !is_identifier(name) || !schema_path.exists() {
            return if if_exists {
                Ok(false)
            } else {
                Err(DbError::NotFound(name.to_string()))
            };
        }

        fs::remove_file(&schema_path)?;
        match fs::remove_file(self.log_path(name)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        info!(table = name, "table dropped");
        Ok(true)
    }

    /// Returns the engine for `name`, opening it on first use.
    ///
    /// # Errors
    /// Returns [DbError::NotFound] if no schema document exists for `name`.
    pub fn get_table(&mut self, name: &str) -> DbResult<&mut Table> {
        if !self.tables.contains_key(name) {
            let table = self.open_table(name)?;
            self.tables.insert(name.to_string(), table);
        }
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::NotFound(name.to_string()))
    }

    /// Names of all tables with a schema document, sorted.
    pub fn list_tables(&self) -> DbResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.config.effective_metadata_dir())? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn describe(&mut self, name: &str) -> DbResult<Schema> {
        Ok(self.get_table(name)?.schema().clone())
    }

    /// Looks a row up by primary key.
    pub fn select_by_key(&mut self, name: &str, value: Value) -> DbResult<Option<Row>> {
        self.get_table(name)?.select_by_key(value)
    }

    /// Parses and runs one statement.
    ///
    /// # Errors
    /// Any parse, validation, type, key or storage failure, as a [DbError].
    ///
    /// # Example
    /// ```
    /// use minidb::{Database, DatabaseConfig, ExecuteResult};
    /// # let dir = tempfile::tempdir().unwrap();
    /// let mut db = Database::open(DatabaseConfig::new(dir.path())).unwrap();
    /// db.execute("CREATE TABLE users (id int PRIMARY KEY, name str)").unwrap();
    /// db.execute("INSERT INTO users (id, name) VALUES (1, 'Alice')").unwrap();
    ///
    /// let result = db.execute("SELECT * FROM users WHERE id = 1").unwrap();
    /// assert_eq!(result.count(), 1);
    /// ```
    pub fn execute(&mut self, text: &str) -> DbResult<ExecuteResult> {
        let command = parse(text)?;
        debug!(?command, "executing");
        self.run(command)
    }

    fn run(&mut self, command: Command) -> DbResult<ExecuteResult> {
        match command {
            Command::CreateTable {
                name,
                columns,
                primary_key,
            } => {
                let columns = columns
                    .into_iter()
                    .map(|spec| ColumnDef::new(spec.name, DataType::from_keyword(&spec.type_name)))
                    .collect();
                self.create_table(&name, columns, primary_key)?;
                Ok(ExecuteResult::Created { table: name })
            }
            Command::DropTable { name, if_exists } => {
                self.drop_table(&name, if_exists)?;
                Ok(ExecuteResult::Dropped { table: name })
            }
            Command::Insert { name, values } => {
                let row = self.get_table(&name)?.insert(values)?;
                Ok(ExecuteResult::Inserted { table: name, row })
            }
            Command::Select {
                name,
                columns,
                predicates,
                limit,
            } => {
                let table = self.get_table(&name)?;
                let rows = table.select(&predicates, &columns, limit)?;
                let columns = if columns.is_empty() {
                    table.schema().column_names()
                } else {
                    columns
                };
                Ok(ExecuteResult::Selected {
                    table: name,
                    columns,
                    rows,
                })
            }
            Command::Update {
                name,
                set,
                predicates,
            } => {
                let count = self.get_table(&name)?.update(&set, &predicates)?;
                Ok(ExecuteResult::Updated { table: name, count })
            }
            Command::Delete { name, predicates } => {
                let count = self.get_table(&name)?.delete(&predicates)?;
                Ok(ExecuteResult::Deleted { table: name, count })
            }
            Command::ShowTables => Ok(ExecuteResult::Tables(self.list_tables()?)),
            Command::Describe { name } => Ok(ExecuteResult::Schema(self.describe(&name)?)),
        }
    }

    // --- Layout ---

    fn open_table(&self, name: &str) -> DbResult<Table> {
        let schema_path = self.schema_path(name);
        if !is_identifier(name) || !schema_path.exists() {
            return Err(DbError::NotFound(name.to_string()));
        }

        let schema: Schema = serde_json::from_str(&fs::read_to_string(&schema_path)?)?;
        schema.validate()?;
        Table::open(schema, self.log_path(name), self.table_options())
    }

    fn schema_path(&self, name: &str) -> PathBuf {
        self.config
            .effective_metadata_dir()
            .join(format!("{name}.json"))
    }

    fn log_path(&self, name: &str) -> PathBuf {
        self.config.data_dir.join(format!("{name}.jsonl"))
    }

    fn table_options(&self) -> TableOptions {
        TableOptions {
            strict_comparisons: self.config.strict_comparisons,
            sync_writes: self.config.sync_writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_db(tmp: &TempDir) -> Database {
        Database::open(DatabaseConfig::new(tmp.path())).unwrap()
    }

    fn selected_rows(result: ExecuteResult) -> Vec<Row> {
        match result {
            ExecuteResult::Selected { rows, .. } => rows,
            other => panic!("expected rows, got {other:?}"),
        }
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Table lifecycle
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_create_and_drop_table() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        let result = db.execute("CREATE TABLE users (id int, name str)").unwrap();
        assert_eq!(result, ExecuteResult::Created { table: "users".into() });
        assert!(tmp.path().join("metadata/users.json").exists());
        assert!(tmp.path().join("users.jsonl").exists());

        db.execute("DROP TABLE users").unwrap();
        assert!(!tmp.path().join("metadata/users.json").exists());
        assert!(!tmp.path().join("users.jsonl").exists());
        assert!(matches!(db.get_table("users"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_table_error() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        db.execute("CREATE TABLE users (id int)").unwrap();
        let err = db.execute("CREATE TABLE users (id int)").unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(ref name) if name == "users"));
    }

    #[test]
    fn test_drop_nonexistent_table() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        assert!(matches!(
            db.execute("DROP TABLE ghosts"),
            Err(DbError::NotFound(_))
        ));
        assert!(db.execute("DROP TABLE IF EXISTS ghosts").is_ok());
        assert!(!db.drop_table("ghosts", true).unwrap());
    }

    #[test]
    fn test_create_table_with_unknown_key_column() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        let err = db.execute("CREATE TABLE t (id int, PRIMARY KEY (uid))").unwrap_err();
        assert!(matches!(err, DbError::InvalidSchema(_)));
        assert!(db.list_tables().unwrap().is_empty());
    }

    #[test]
    fn test_list_tables_sorted() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        db.execute("CREATE TABLE zebras (id int)").unwrap();
        db.execute("CREATE TABLE apples (id int)").unwrap();
        db.execute("CREATE TABLE mangos (id int)").unwrap();

        let result = db.execute("SHOW TABLES").unwrap();
        assert_eq!(
            result,
            ExecuteResult::Tables(vec!["apples".into(), "mangos".into(), "zebras".into()])
        );
        assert_eq!(result.message(), "3 tables.");
    }

    #[test]
    fn test_describe_keeps_declared_order() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        db.execute(
            "CREATE TABLE items \
             (sku VARCHAR(20) PRIMARY KEY, price DECIMAL(10,2), qty INT, active BOOL)",
        )
        .unwrap();

        let ExecuteResult::Schema(schema) = db.execute("DESCRIBE items").unwrap() else {
            panic!("expected a schema");
        };
        assert_eq!(
            schema.columns,
            vec![
                ColumnDef::new("sku", DataType::String),
                ColumnDef::new("price", DataType::Float),
                ColumnDef::new("qty", DataType::Integer),
                ColumnDef::new("active", DataType::Boolean),
            ]
        );
        assert_eq!(schema.primary_key.as_deref(), Some("sku"));
    }

    // ─────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_users_scenario() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        db.execute("CREATE TABLE users (id int, name str)").unwrap();
        db.execute("INSERT INTO users (id, name) VALUES (1, 'Alice')")
            .unwrap();

        let rows = selected_rows(db.execute("SELECT * FROM users WHERE id = 1").unwrap());
        assert_eq!(
            rows,
            vec![row(&[("id", Value::Int(1)), ("name", Value::from("Alice"))])]
        );

        let updated = db
            .execute("UPDATE users SET name = 'Bob' WHERE id = 1")
            .unwrap();
        assert_eq!(updated.count(), 1);

        let rows = selected_rows(db.execute("SELECT * FROM users").unwrap());
        assert_eq!(rows[0].get("name"), Some(&Value::from("Bob")));

        let deleted = db.execute("DELETE FROM users WHERE id = 1").unwrap();
        assert_eq!(deleted, ExecuteResult::Deleted { table: "users".into(), count: 1 });

        assert!(selected_rows(db.execute("SELECT * FROM users").unwrap()).is_empty());
    }

    #[test]
    fn test_select_columns_and_limit() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        db.execute("CREATE TABLE users (id int, name str, age int)").unwrap();
        for i in 1..=5 {
            db.execute(&format!(
                "INSERT INTO users (id, name, age) VALUES ({i}, 'user{i}', {})",
                20 + i
            ))
            .unwrap();
        }

        let result = db
            .execute("SELECT name, id FROM users WHERE age >= 22 LIMIT 2")
            .unwrap();
        let ExecuteResult::Selected { columns, rows, .. } = result else {
            panic!("expected rows");
        };
        assert_eq!(columns, vec!["name", "id"]);
        assert_eq!(
            rows,
            vec![
                row(&[("name", Value::from("user2")), ("id", Value::Int(2))]),
                row(&[("name", Value::from("user3")), ("id", Value::Int(3))]),
            ]
        );
    }

    #[test]
    fn test_primary_key_through_execute() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        db.execute("CREATE TABLE users (id int PRIMARY KEY, name str)").unwrap();
        db.execute("INSERT INTO users (id, name) VALUES (1, 'Alice')").unwrap();

        let err = db
            .execute("INSERT INTO users (id, name) VALUES (1, 'Again')")
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateKey { .. }));

        let alice = db.select_by_key("users", Value::Int(1)).unwrap().unwrap();
        assert_eq!(alice.get("name"), Some(&Value::from("Alice")));
    }

    #[test]
    fn test_type_error_through_execute() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        db.execute("CREATE TABLE users (id int, age int)").unwrap();
        let err = db
            .execute("INSERT INTO users (id, age) VALUES (1, 'old')")
            .unwrap_err();
        assert!(matches!(err, DbError::Type { .. }));
    }

    #[test]
    fn test_errors_do_not_poison_database() {
        let tmp = TempDir::new().unwrap();
        let mut db = open_db(&tmp);

        assert!(matches!(db.execute("EXPLODE users"), Err(DbError::Parse(_))));
        assert!(matches!(
            db.execute("SELECT * FROM ghosts"),
            Err(DbError::NotFound(_))
        ));

        db.execute("CREATE TABLE users (id int)").unwrap();
        assert!(db.execute("INSERT INTO users (id) VALUES (1)").is_ok());
    }

    #[test]
    fn test_strict_comparisons_from_config() {
        let tmp = TempDir::new().unwrap();
        let config = DatabaseConfig::new(tmp.path()).with_strict_comparisons(true);
        let mut db = Database::open(config).unwrap();

        db.execute("CREATE TABLE users (id int, name str)").unwrap();
        db.execute("INSERT INTO users (id, name) VALUES (1, 'Alice')").unwrap();

        let err = db.execute("SELECT * FROM users WHERE name > 3").unwrap_err();
        assert!(matches!(err, DbError::Comparison { .. }));
    }

    // ─────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_reopen_database() {
        let tmp = TempDir::new().unwrap();
        {
            let mut db = open_db(&tmp);
            db.execute("CREATE TABLE users (id int PRIMARY KEY, name str)").unwrap();
            db.execute("INSERT INTO users (id, name) VALUES (1, 'Alice')").unwrap();
            db.execute("INSERT INTO users (id, name) VALUES (2, 'Bob')").unwrap();
        }

        let mut db = open_db(&tmp);
        assert_eq!(db.get_table("users").unwrap().count(), 2);
        assert!(db.select_by_key("users", Value::Int(2)).unwrap().is_some());
        assert!(matches!(
            db.execute("INSERT INTO users (id, name) VALUES (2, 'Twin')"),
            Err(DbError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_custom_metadata_dir() {
        let tmp = TempDir::new().unwrap();
        let config = DatabaseConfig::new(tmp.path().join("rows"))
            .with_metadata_dir(tmp.path().join("schemas"));
        let mut db = Database::open(config).unwrap();

        db.execute("CREATE TABLE users (id int)").unwrap();
        assert!(tmp.path().join("schemas/users.json").exists());
        assert!(tmp.path().join("rows/users.jsonl").exists());
    }

    #[test]
    fn test_execute_result_messages() {
        assert_eq!(
            ExecuteResult::Updated { table: "t".into(), count: 1 }.message(),
            "1 row updated."
        );
        assert_eq!(
            ExecuteResult::Deleted { table: "t".into(), count: 0 }.message(),
            "0 rows deleted."
        );
        assert_eq!(
            ExecuteResult::Created { table: "t".into() }.message(),
            "Table 't' created."
        );
    }
}
