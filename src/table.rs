use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::{ComparisonOp, Predicate};
use crate::column::ColumnDef;
use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::tokenizer::is_identifier;
use crate::value::{IndexKey, Value};

/// The declared shape of a table, persisted once as its schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub primary_key: Option<String>,
}

impl Schema {
    /// Builds and validates a schema.
    ///
    /// # Errors
    /// Returns [DbError::InvalidSchema] if a name is not an identifier, the
    /// table has no columns, a column name repeats, or the primary key does
    /// not name a declared column.
    pub fn new(
        table_name: impl Into<String>,
        columns: Vec<ColumnDef>,
        primary_key: Option<String>,
    ) -> DbResult<Self> {
        let schema = Self {
            table_name: table_name.into(),
            columns,
            primary_key,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> DbResult<()> {
        if !is_identifier(&self.table_name) {
            return Err(DbError::invalid_schema(format!(
                "invalid table name {:?}",
                self.table_name
            )));
        }
        if self.columns.is_empty() {
            return Err(DbError::invalid_schema("a table needs at least one column"));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !is_identifier(&column.name) {
                return Err(DbError::invalid_schema(format!(
                    "invalid column name {:?}",
                    column.name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(DbError::invalid_schema(format!(
                    "column {:?} is declared twice",
                    column.name
                )));
            }
        }

        if let Some(key) = &self.primary_key {
            if self.column(key).is_none() {
                return Err(DbError::invalid_schema(format!(
                    "primary key {key:?} is not a column of {:?}",
                    self.table_name
                )));
            }
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }
}

/// Engine behaviour switches, taken from [crate::DatabaseConfig].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// Abort on incomparable WHERE operands instead of skipping the row.
    pub strict_comparisons: bool,
    /// `fsync` after every append and rewrite.
    pub sync_writes: bool,
}

/// One table: its schema, its row log on disk and its primary-key index.
///
/// The row log holds one JSON object per line in insertion order. Inserts
/// append a line; updates and deletes rewrite the whole log through a
/// temporary file that is renamed over the original.
pub struct Table {
    schema: Schema,
    log_path: PathBuf,
    /// Primary-key value → copy of the row holding it. `None` when the schema
    /// declares no primary key.
    index: Option<HashMap<IndexKey, Row>>,
    row_count: usize,
    options: TableOptions,
}

impl Table {
    /// Creates a table with an empty row log, replacing any existing log.
    pub fn create(schema: Schema, log_path: PathBuf, options: TableOptions) -> DbResult<Self> {
        File::create(&log_path)?;
        let index = schema.primary_key.as_ref().map(|_| HashMap::new());
        Ok(Self {
            schema,
            log_path,
            index,
            row_count: 0,
            options,
        })
    }

    /// Opens a table, scanning its row log to count rows and build the index.
    pub fn open(schema: Schema, log_path: PathBuf, options: TableOptions) -> DbResult<Self> {
        if !log_path.exists() {
            File::create(&log_path)?;
        }
        if terminate_torn_tail(&log_path)? {
            warn!(
                table = %schema.table_name,
                "row log ends in a partial line, sealing it before appending"
            );
        }

        let mut table = Self {
            index: schema.primary_key.as_ref().map(|_| HashMap::new()),
            schema,
            log_path,
            row_count: 0,
            options,
        };
        table.rebuild()?;
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.schema.table_name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Number of rows currently in the log.
    pub fn count(&self) -> usize {
        self.row_count
    }

    /// Inserts a row and returns it as stored.
    ///
    /// Every declared column is coerced to its type (absent columns become
    /// `NULL`); undeclared columns are carried through unchanged.
    ///
    /// # Errors
    /// - [DbError::Type] if a value cannot be coerced.
    /// - [DbError::DuplicateKey] if the primary key is already taken. Nothing
    ///   is written in that case.
    pub fn insert(&mut self, values: impl IntoIterator<Item = (String, Value)>) -> DbResult<Row> {
        let mut supplied: Vec<(String, Value)> = values.into_iter().collect();

        let mut row = Row::new();
        for column in &self.schema.columns {
            let value = match supplied.iter().position(|(name, _)| *name == column.name) {
                Some(pos) => supplied.remove(pos).1,
                None => Value::Null,
            };
            row.set(&column.name, column.coerce(value)?);
        }
        for (name, value) in supplied {
            row.set(&name, value);
        }

        let key = self.key_of(&row);
        if let (Some(index), Some(key)) = (&self.index, &key) {
            if index.contains_key(key) {
                return Err(self.duplicate_key(&row));
            }
        }

        self.append(&row)?;

        if let (Some(index), Some(key)) = (&mut self.index, key) {
            index.insert(key, row.clone());
        }
        self.row_count += 1;
        Ok(row)
    }

    /// Returns the rows matching every predicate, in log order.
    ///
    /// Rows are projected to `columns`, or to all schema columns when
    /// `columns` is empty. Scanning stops once `limit` rows are collected.
    pub fn select(
        &self,
        predicates: &[Predicate],
        columns: &[String],
        limit: Option<usize>,
    ) -> DbResult<Vec<Row>> {
        let predicates = self.prepare(predicates);
        let projection = if columns.is_empty() {
            self.schema.column_names()
        } else {
            columns.to_vec()
        };

        if limit == Some(0) {
            return Ok(Vec::new());
        }

        if let Some(hit) = self.key_lookup(&predicates) {
            return Ok(hit.map(|row| row.project(&projection)).into_iter().collect());
        }

        let mut rows = Vec::new();
        self.scan(|row| {
            if self.matches(&row, &predicates)? {
                rows.push(row.project(&projection));
                if limit.is_some_and(|n| rows.len() >= n) {
                    return Ok(ControlFlow::Break(()));
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(rows)
    }

    /// Looks a row up by primary key through the index.
    ///
    /// # Errors
    /// - [DbError::NoPrimaryKey] if the table has no primary key.
    /// - [DbError::Type] if `value` cannot be coerced to the key's type.
    pub fn select_by_key(&self, value: Value) -> DbResult<Option<Row>> {
        let (Some(index), Some(key_column)) = (&self.index, self.key_column()) else {
            return Err(DbError::NoPrimaryKey(self.name().to_string()));
        };

        let key = key_column.coerce(value)?;
        Ok(key.index_key().and_then(|key| index.get(&key).cloned()))
    }

    /// Applies `set` to every row matching `predicates` and returns how many
    /// rows changed.
    ///
    /// # Errors
    /// - [DbError::Type] if an assigned value cannot be coerced.
    /// - [DbError::DuplicateKey] if the update would give two rows the same
    ///   primary key. Nothing is written in that case.
    pub fn update(&mut self, set: &[(String, Value)], predicates: &[Predicate]) -> DbResult<usize> {
        let predicates = self.prepare(predicates);
        let mut rows = self.read_rows()?;
        let matched = self.match_mask(&rows, &predicates)?;

        let count = matched.count_ones();
        if count == 0 {
            return Ok(0);
        }

        let assignments = set
            .iter()
            .map(|(column, value)| match self.schema.column(column) {
                Some(def) => Ok((column.clone(), def.coerce(value.clone())?)),
                None => Ok((column.clone(), value.clone())),
            })
            .collect::<DbResult<Vec<_>>>()?;

        let old_keys: Vec<IndexKey> = matched
            .iter_ones()
            .filter_map(|i| self.key_of(&rows[i]))
            .collect();

        for i in matched.iter_ones() {
            for (column, value) in &assignments {
                rows[i].set(column, value.clone());
            }
        }

        let key_changed = self
            .schema
            .primary_key
            .as_ref()
            .is_some_and(|key| assignments.iter().any(|(column, _)| column == key));
        if key_changed {
            self.check_unique(&rows)?;
        }

        self.rewrite(&rows)?;

        if let Some(key_column) = self.schema.primary_key.clone() {
            let index = self.index.get_or_insert_with(HashMap::new);
            for key in &old_keys {
                index.remove(key);
            }
            for i in matched.iter_ones() {
                if let Some(key) = rows[i].get(&key_column).and_then(Value::index_key) {
                    index.insert(key, rows[i].clone());
                }
            }
        }

        debug!(table = %self.name(), count, "updated rows");
        Ok(count)
    }

    /// Removes every row matching `predicates` and returns how many were
    /// removed.
    pub fn delete(&mut self, predicates: &[Predicate]) -> DbResult<usize> {
        let predicates = self.prepare(predicates);
        let rows = self.read_rows()?;
        let matched = self.match_mask(&rows, &predicates)?;

        let count = matched.count_ones();
        if count == 0 {
            return Ok(0);
        }

        let mut survivors = Vec::with_capacity(rows.len() - count);
        let mut removed_keys = Vec::new();
        for (row, is_match) in rows.into_iter().zip(matched.iter().by_vals()) {
            if is_match {
                removed_keys.extend(self.key_of(&row));
            } else {
                survivors.push(row);
            }
        }

        self.rewrite(&survivors)?;

        if let Some(index) = &mut self.index {
            for key in &removed_keys {
                index.remove(key);
            }
        }
        self.row_count = survivors.len();

        debug!(table = %self.name(), count, "deleted rows");
        Ok(count)
    }

    // --- Predicates ---

    /// Coerces each literal to its column's declared type when that loses
    /// nothing, so `id = '1'` on an integer column compares as `id = 1` while
    /// `id = 2.5` keeps its fraction.
    fn prepare(&self, predicates: &[Predicate]) -> Vec<Predicate> {
        predicates
            .iter()
            .map(|predicate| {
                let value = self
                    .schema
                    .column(&predicate.column)
                    .and_then(|col| col.coerce_exact(predicate.value.clone()).ok())
                    .unwrap_or_else(|| predicate.value.clone());
                Predicate::new(predicate.column.clone(), predicate.op, value)
            })
            .collect()
    }

    /// Serves `pk = literal` from the index. Returns `None` when the query is
    /// not a single equality on the primary key.
    fn key_lookup(&self, predicates: &[Predicate]) -> Option<Option<Row>> {
        let index = self.index.as_ref()?;
        let key_column = self.schema.primary_key.as_deref()?;

        match predicates {
            [predicate] if predicate.op == ComparisonOp::Eq && predicate.column == key_column => {
                let key = predicate.value.index_key()?;
                Some(index.get(&key).cloned())
            }
            _ => None,
        }
    }

    fn match_mask(&self, rows: &[Row], predicates: &[Predicate]) -> DbResult<BitVec> {
        let mut matched = bitvec![0; rows.len()];
        for (i, row) in rows.iter().enumerate() {
            if self.matches(row, predicates)? {
                matched.set(i, true);
            }
        }
        Ok(matched)
    }

    /// True when the row satisfies every predicate.
    ///
    /// An incomparable ordering comparison excludes the row, unless the table
    /// runs with strict comparisons.
    fn matches(&self, row: &Row, predicates: &[Predicate]) -> DbResult<bool> {
        for predicate in predicates {
            match evaluate(row, predicate) {
                Ok(true) => continue,
                Ok(false) => return Ok(false),
                Err(err @ DbError::Comparison { .. }) if !self.options.strict_comparisons => {
                    debug!(table = %self.name(), error = %err, "row excluded");
                    return Ok(false);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    // --- Primary key ---

    fn key_column(&self) -> Option<&ColumnDef> {
        self.schema
            .primary_key
            .as_deref()
            .and_then(|key| self.schema.column(key))
    }

    fn key_of(&self, row: &Row) -> Option<IndexKey> {
        let key_column = self.schema.primary_key.as_deref()?;
        row.get(key_column).and_then(Value::index_key)
    }

    fn duplicate_key(&self, row: &Row) -> DbError {
        let column = self.schema.primary_key.clone().unwrap_or_default();
        let value = row.get(&column).cloned().unwrap_or(Value::Null);
        DbError::DuplicateKey { column, value }
    }

    /// Fails if two rows share a non-null primary key.
    fn check_unique(&self, rows: &[Row]) -> DbResult<()> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in rows {
            if let Some(key) = self.key_of(row) {
                if !seen.insert(key) {
                    return Err(self.duplicate_key(row));
                }
            }
        }
        Ok(())
    }

    // --- Row log ---

    /// Recounts the log and rebuilds the index from it.
    fn rebuild(&mut self) -> DbResult<()> {
        let mut count = 0;
        let mut index = self.schema.primary_key.as_ref().map(|_| HashMap::new());

        self.scan(|row| {
            count += 1;
            if let (Some(index), Some(key)) = (&mut index, self.key_of(&row)) {
                if index.insert(key, row.clone()).is_some() {
                    warn!(
                        table = %self.name(),
                        row = count,
                        "duplicate primary key in row log, keeping the later row"
                    );
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;

        self.row_count = count;
        self.index = index;
        debug!(table = %self.name(), rows = count, "opened table");
        Ok(())
    }

    /// Visits every readable row of the log in order.
    ///
    /// Lines that are not valid UTF-8 JSON objects are skipped with a warning:
    /// they are what a crash in the middle of an append leaves behind.
    fn scan(&self, mut visit: impl FnMut(Row) -> DbResult<ControlFlow<()>>) -> DbResult<()> {
        let mut reader = BufReader::new(File::open(&self.log_path)?);
        let mut buf = Vec::new();
        let mut line_no = 0;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            line_no += 1;

            let Ok(line) = std::str::from_utf8(&buf) else {
                warn!(table = %self.name(), line = line_no, "skipping non UTF-8 row log line");
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let map = match serde_json::from_str::<serde_json::Map<_, _>>(line) {
                Ok(map) => map,
                Err(e) => {
                    warn!(
                        table = %self.name(),
                        line = line_no,
                        error = %e,
                        "skipping corrupted row log line"
                    );
                    continue;
                }
            };

            let row = Row::from_json_map(map, &self.schema.columns);
            if visit(row)?.is_break() {
                return Ok(());
            }
        }
    }

    fn read_rows(&self) -> DbResult<Vec<Row>> {
        let mut rows = Vec::with_capacity(self.row_count);
        self.scan(|row| {
            rows.push(row);
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(rows)
    }

    /// Appends one row as the new last line of the log.
    fn append(&self, row: &Row) -> DbResult<()> {
        let mut line = row.to_json_line()?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(line.as_bytes())?;

        if self.options.sync_writes {
            file.sync_all()?;
        }
        Ok(())
    }

    /// Replaces the log with `rows`.
    ///
    /// Uses atomic file replacement: write to temp file, flush, rename.
    fn rewrite(&self, rows: &[Row]) -> DbResult<()> {
        let tmp_path = self.log_path.with_extension("jsonl.tmp");

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            writer.write_all(row.to_json_line()?.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;

        if self.options.sync_writes {
            file.sync_all()?;
        }
        drop(file);

        fs::rename(&tmp_path, &self.log_path)?;

        if self.options.sync_writes {
            if let Some(dir) = self.log_path.parent() {
                if let Err(e) = File::open(dir).and_then(|dir| dir.sync_all()) {
                    warn!(table = %self.name(), error = %e, "failed to sync data directory");
                }
            }
        }
        Ok(())
    }
}

/// Appends a newline when the log does not end with one, so the next append
/// starts on a fresh line instead of extending a partially written row.
/// Returns whether the log needed it.
fn terminate_torn_tail(path: &Path) -> DbResult<bool> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(false);
    }

    file.write_all(b"\n")?;
    file.sync_all()?;
    Ok(true)
}

/// Evaluates one predicate against one row.
fn evaluate(row: &Row, predicate: &Predicate) -> DbResult<bool> {
    let literal = &predicate.value;

    let Some(actual) = row.get(&predicate.column) else {
        // an absent column only satisfies `= NULL`
        return Ok(predicate.op == ComparisonOp::Eq && literal.is_null());
    };

    let op = predicate.op;
    if op.is_ordering() {
        let ordering = actual.compare(literal).ok_or_else(|| DbError::Comparison {
            left: actual.clone(),
            op: op.symbol().to_string(),
            right: literal.clone(),
        })?;
        return Ok(match op {
            ComparisonOp::Gt => ordering.is_gt(),
            ComparisonOp::Lt => ordering.is_lt(),
            ComparisonOp::GtEq => ordering.is_ge(),
            ComparisonOp::LtEq => ordering.is_le(),
            ComparisonOp::Eq => ordering.is_eq(),
            ComparisonOp::NotEq => ordering.is_ne(),
        });
    }

    let equal = match (actual, literal) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => actual.loosely_equals(literal),
    };
    Ok(if op == ComparisonOp::Eq { equal } else { !equal })
}
