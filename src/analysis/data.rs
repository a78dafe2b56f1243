//! Shapes of data returned by a demo parser, and how they are written out.

use std::collections::HashMap;
use std::io::{self, Write};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::category::Category;

/// A single structured object, e.g. the demo header.
pub type Record = Map<String, Value>;

/// What a parser produced for one category.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryData {
    /// Tabular data, written as CSV.
    Table(Table),
    /// One metadata object, written as JSON.
    Record(Record),
    /// Nothing to write.
    Absent,
}

impl CategoryData {
    /// Whether there is anything worth writing.
    pub fn has_data(&self) -> bool {
        match self {
            CategoryData::Table(table) => !table.is_empty(),
            CategoryData::Record(record) => !record.is_empty(),
            CategoryData::Absent => false,
        }
    }
}

/// Errors writing a category to disk.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("row {row} has {found} fields, header has {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("table has rows but no columns")]
    NoColumns,

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Column-oriented table with positional rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Build a table from row objects (`[{"tick": 1, ...}, ...]`).
    ///
    /// Columns are the union of keys in first-seen order; a row missing a
    /// key gets `null` in that column.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in &records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .into_iter()
            .map(|mut record| {
                columns
                    .iter()
                    .map(|c| record.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write as CSV with a header row.
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<(), SerializeError> {
        if self.columns.is_empty() {
            return Err(SerializeError::NoColumns);
        }

        let header: Vec<String> = self.columns.iter().map(|c| escape_csv(c)).collect();
        writeln!(out, "{}", header.join(","))?;

        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(SerializeError::RaggedRow {
                    row: i,
                    found: row.len(),
                    expected: self.columns.len(),
                });
            }
            let cells: Vec<String> = row.iter().map(csv_cell).collect();
            writeln!(out, "{}", cells.join(","))?;
        }

        out.flush()?;
        Ok(())
    }
}

/// Write a record as pretty JSON with four-space indentation.
pub fn write_record_json<W: Write>(record: &Record, mut out: W) -> Result<(), SerializeError> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    record.serialize(&mut ser)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => escape_csv(s),
        // Nested values are kept as compact JSON in a single cell.
        Value::Array(_) | Value::Object(_) => escape_csv(&value.to_string()),
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Everything a parser produced, keyed by category.
///
/// Categories never inserted read back as [`CategoryData::Absent`].
#[derive(Debug, Clone, Default)]
pub struct DemoData {
    categories: HashMap<Category, CategoryData>,
}

impl DemoData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: Category, data: CategoryData) {
        self.categories.insert(category, data);
    }

    pub fn with(mut self, category: Category, data: CategoryData) -> Self {
        self.insert(category, data);
        self
    }

    /// Remove and return a category's data.
    pub fn take(&mut self, category: Category) -> CategoryData {
        self.categories
            .remove(&category)
            .unwrap_or(CategoryData::Absent)
    }

    /// Number of categories with writable data.
    pub fn populated(&self) -> usize {
        self.categories.values().filter(|d| d.has_data()).count()
    }
}
