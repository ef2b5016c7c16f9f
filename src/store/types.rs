//! Execution result types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::dataset::Value;

/// Result of executing a validated query against the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Column names of the result set, in order.
    pub columns: Vec<String>,

    /// Rows of data, each aligned with `columns`.
    pub rows: Vec<Vec<Value>>,

    /// Number of rows in the result (after truncation).
    pub row_count: usize,

    /// Total number of rows before truncation, if known.
    pub total_rows: Option<usize>,

    /// Whether the result was cut down to the configured row cap.
    #[serde(default)]
    pub truncated: bool,

    /// Time taken to execute the query.
    #[serde(with = "duration_serde")]
    pub execution_time: Duration,
}

impl ExecutionResult {
    /// Creates an execution result with the given columns and rows.
    pub fn with_data(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            total_rows: Some(row_count),
            truncated: false,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns a truncation warning message if the result was truncated.
    pub fn truncation_warning(&self) -> Option<String> {
        if self.truncated {
            let total = self.total_rows.unwrap_or(self.row_count);
            Some(format!(
                "Result truncated: showing {} of {} rows",
                self.row_count, total
            ))
        } else {
            None
        }
    }
}

/// Serde support for Duration (not natively supported by serde).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_nanos().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u128::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}
