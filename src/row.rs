use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::column::ColumnDef;
use crate::error::DbResult;
use crate::value::Value;

/// A single record: an ordered mapping from column name to [Value].
///
/// Rows built by the engine list the declared columns first, in schema order,
/// followed by any pass-through columns that were supplied on insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `column`, if the row has that key.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Sets `column` to `value`, keeping the column's position if it exists.
    pub fn set(&mut self, column: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column names in row order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Keeps only `columns`, in the requested order. A column the row does
    /// not carry projects as `NULL`.
    pub fn project(&self, columns: &[String]) -> Row {
        columns
            .iter()
            .map(|col| (col.clone(), self.get(col).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    /// Builds a row from a decoded log line, normalised against the schema.
    pub(crate) fn from_json_map(
        mut map: serde_json::Map<String, serde_json::Value>,
        columns: &[ColumnDef],
    ) -> Row {
        let mut row: Row = columns
            .iter()
            .map(|col| {
                let value = map
                    .remove(&col.name)
                    .map(Value::from_json)
                    .unwrap_or(Value::Null);
                (col.name.clone(), value)
            })
            .collect();

        for (name, json) in map {
            row.fields.push((name, Value::from_json(json)));
        }
        row
    }

    /// Serialises the row as one log line (without the trailing newline).
    pub(crate) fn to_json_line(&self) -> DbResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.set(&name, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
