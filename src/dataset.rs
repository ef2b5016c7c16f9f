//! Dataset container handed over by the ingestion layer.
//!
//! The core never parses spreadsheet files itself; an external collaborator
//! supplies a loaded dataset as columns plus row-major scalar cells.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A loaded tabular dataset: ordered column names and row-major cells.
///
/// Immutable for the lifetime of a session; a re-upload replaces the whole
/// dataset (and with it the session context built from it).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Ordered column names, unique within the dataset.
    pub columns: Vec<String>,
    /// Rows, each aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Creates a dataset from column names and rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the dataset holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns an iterator over the values of a single column.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Formats the first `n` rows as an aligned text block for prompts.
    pub fn format_sample(&self, n: usize) -> String {
        let mut out = String::new();
        out.push_str(&self.columns.join(" | "));
        out.push('\n');
        for row in self.rows.iter().take(n) {
            let line = row
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(" | ");
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// A single scalar cell value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// NULL / missing cell.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts the value to a string representation for display.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dataset() -> Dataset {
        Dataset::new(
            vec!["amount".to_string(), "status".to_string()],
            vec![
                vec![Value::Float(10.5), Value::from("paid")],
                vec![Value::Float(7.0), Value::from("open")],
                vec![Value::Null, Value::from("paid")],
            ],
        )
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_display_string(), "NULL");
        assert_eq!(Value::Bool(true).to_display_string(), "true");
        assert_eq!(Value::Int(42).to_display_string(), "42");
        assert_eq!(Value::Float(2.5).to_display_string(), "2.5");
        assert_eq!(Value::from("hello").to_display_string(), "hello");
    }

    #[test]
    fn test_value_from_conversions() {
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(1i64)), Value::Int(1));
    }

    #[test]
    fn test_column_values() {
        let ds = sample_dataset();
        let statuses: Vec<_> = ds.column_values(1).collect();
        assert_eq!(statuses.len(), 3);
        assert_eq!(*statuses[0], Value::from("paid"));
    }

    #[test]
    fn test_format_sample_bounded() {
        let ds = sample_dataset();
        let sample = ds.format_sample(2);
        assert!(sample.starts_with("amount | status"));
        // header + 2 rows
        assert_eq!(sample.trim_end().lines().count(), 3);
    }

    #[test]
    fn test_row_count() {
        assert_eq!(sample_dataset().row_count(), 3);
        assert!(Dataset::default().is_empty());
    }
}
