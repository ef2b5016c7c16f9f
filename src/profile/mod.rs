//! Schema Profiler.
//!
//! Derives a structural summary of the loaded dataset (column names, inferred
//! semantic types, sample values, basic statistics). Built once per loaded
//! dataset, immutable for the session, and consumed by SQL generation,
//! validation, and the contextual prompts.

use crate::dataset::{Dataset, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Maximum sample values kept per column profile.
const MAX_SAMPLE_VALUES: usize = 3;

/// A column is categorical when its distinct count is at most this fraction
/// of the row count.
const CATEGORICAL_FRACTION: f64 = 0.1;

/// Inferred semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    /// All non-null values parse as numbers.
    Numeric,
    /// Free-form text.
    Text,
    /// Text with a small number of distinct values.
    Categorical,
    /// All non-null values match a common date/time pattern.
    Temporal,
    /// Column could not be profiled (e.g. no non-null values).
    Unknown,
}

impl InferredType {
    /// Returns the type as a lowercase string for display and prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Text => "text",
            Self::Categorical => "categorical",
            Self::Temporal => "temporal",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for InferredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structural and statistical profile of a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    /// Column name, unique within the summary.
    pub name: String,

    /// Inferred semantic type.
    pub inferred_type: InferredType,

    /// Bounded set of example values (display form).
    pub sample_values: Vec<String>,

    /// Number of NULL cells, counted over the full column.
    pub null_count: usize,

    /// Number of distinct non-null values, counted over the full column.
    pub distinct_count: usize,
}

/// Structural summary of the loaded dataset.
///
/// Rebuilt only when the dataset is replaced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSummary {
    /// Ordered column profiles.
    pub columns: Vec<ColumnProfile>,

    /// Total row count of the profiled dataset.
    pub row_count: usize,
}

impl SchemaSummary {
    /// Profiles a dataset. Pure derivation: never fails, no side effects;
    /// columns that cannot be classified default to `unknown`.
    pub fn profile(dataset: &Dataset) -> Self {
        let row_count = dataset.row_count();
        let columns = dataset
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| profile_column(name, dataset.column_values(i), row_count))
            .collect();

        Self { columns, row_count }
    }

    /// Returns true if the summary contains a column with the given name
    /// (ASCII case-insensitive, matching SQL identifier semantics).
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Looks up a column profile by name (ASCII case-insensitive).
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Formats the summary for inclusion in LLM prompts.
    ///
    /// Column names containing spaces are bracket-quoted, and an instruction
    /// line reminds the model to quote them the same way.
    pub fn format_for_llm(&self, table_name: &str) -> String {
        let mut out = format!("Table: {}\nColumns:\n", table_name);

        let mut has_spaced_names = false;
        for col in &self.columns {
            let quoted = if col.name.contains(' ') {
                has_spaced_names = true;
                format!("[{}]", col.name)
            } else {
                col.name.clone()
            };
            out.push_str(&format!(
                "  {} ({}) - examples: [{}]\n",
                quoted,
                col.inferred_type,
                col.sample_values.join(", ")
            ));
        }

        out.push_str(&format!("\nTotal rows: {}\n", self.row_count));

        if has_spaced_names {
            out.push_str(
                "\nIMPORTANT: Column names with spaces must be enclosed in square brackets like [Column Name].\n",
            );
        }

        out
    }

    /// Computes a hash of the summary content for prompt cache invalidation.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.row_count.hash(&mut hasher);
        self.columns.len().hash(&mut hasher);
        for col in &self.columns {
            col.name.hash(&mut hasher);
            col.inferred_type.hash(&mut hasher);
            col.null_count.hash(&mut hasher);
            col.distinct_count.hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Profiles one column over its full value sequence.
fn profile_column<'a>(
    name: &str,
    values: impl Iterator<Item = &'a Value>,
    row_count: usize,
) -> ColumnProfile {
    let mut null_count = 0usize;
    let mut non_null = 0usize;
    let mut all_numeric = true;
    let mut all_temporal = true;
    let mut all_text = true;
    let mut distinct: HashSet<String> = HashSet::new();
    let mut samples: Vec<String> = Vec::new();

    for value in values {
        match value {
            Value::Null => {
                null_count += 1;
                continue;
            }
            Value::Int(_) | Value::Float(_) => {
                all_temporal = false;
                all_text = false;
            }
            Value::Bool(_) => {
                all_numeric = false;
                all_temporal = false;
            }
            Value::String(s) => {
                if s.trim().parse::<f64>().is_err() {
                    all_numeric = false;
                }
                if !is_temporal(s.trim()) {
                    all_temporal = false;
                }
            }
        }

        non_null += 1;
        let display = value.to_display_string();
        if distinct.insert(display.clone()) && samples.len() < MAX_SAMPLE_VALUES {
            samples.push(display);
        }
    }

    let distinct_count = distinct.len();
    let inferred_type = if non_null == 0 {
        InferredType::Unknown
    } else if all_numeric {
        InferredType::Numeric
    } else if all_temporal {
        InferredType::Temporal
    } else if all_text && is_categorical(distinct_count, row_count) {
        InferredType::Categorical
    } else {
        InferredType::Text
    };

    ColumnProfile {
        name: name.to_string(),
        inferred_type,
        sample_values: samples,
        null_count,
        distinct_count,
    }
}

fn is_categorical(distinct_count: usize, row_count: usize) -> bool {
    row_count > 0 && (distinct_count as f64) <= (row_count as f64) * CATEGORICAL_FRACTION
}

fn temporal_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // ISO date and datetime
            r"^\d{4}-\d{2}-\d{2}$",
            r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2})?$",
            // Slash dates: 2024/01/31 and 1/31/2024
            r"^\d{4}/\d{2}/\d{2}$",
            r"^\d{1,2}/\d{1,2}/\d{4}$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("temporal pattern is valid"))
        .collect()
    })
}

/// Returns true if the string matches one of the supported date/time patterns.
pub fn is_temporal(s: &str) -> bool {
    !s.is_empty() && temporal_patterns().iter().any(|re| re.is_match(s))
}

/// Normalizes a recognized temporal string to sortable ISO-8601 form.
///
/// ISO inputs pass through unchanged; slash dates are rewritten. Ambiguous
/// `d/m/yyyy` vs `m/d/yyyy` is resolved as month-first. Returns `None` for
/// strings that match no supported pattern.
pub fn normalize_temporal(s: &str) -> Option<String> {
    let s = s.trim();
    if !is_temporal(s) {
        return None;
    }

    if s.contains('-') {
        return Some(s.replace('T', " "));
    }

    let parts: Vec<&str> = s.split('/').collect();
    match parts.as_slice() {
        // yyyy/mm/dd
        [y, m, d] if y.len() == 4 => Some(format!("{}-{:0>2}-{:0>2}", y, m, d)),
        // m/d/yyyy
        [m, d, y] => Some(format!("{}-{:0>2}-{:0>2}", y, m, d)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    fn dataset(columns: &[&str], rows: Vec<Vec<Value>>) -> Dataset {
        Dataset::new(columns.iter().map(|s| s.to_string()).collect(), rows)
    }

    #[test]
    fn test_numeric_column() {
        let ds = dataset(
            &["amount"],
            vec![
                vec![Value::Float(1.5)],
                vec![Value::Int(2)],
                vec![Value::from("3.25")],
                vec![Value::Null],
            ],
        );
        let summary = SchemaSummary::profile(&ds);

        let col = &summary.columns[0];
        assert_eq!(col.inferred_type, InferredType::Numeric);
        assert_eq!(col.null_count, 1);
        assert_eq!(col.distinct_count, 3);
    }

    #[test]
    fn test_temporal_column() {
        let ds = dataset(
            &["posted"],
            vec![
                vec![Value::from("2024-01-02")],
                vec![Value::from("2024-02-03")],
                vec![Value::Null],
            ],
        );
        let summary = SchemaSummary::profile(&ds);
        assert_eq!(summary.columns[0].inferred_type, InferredType::Temporal);
    }

    #[test]
    fn test_categorical_column() {
        // 20 rows, 2 distinct text values -> categorical
        let rows: Vec<Vec<Value>> = (0..20)
            .map(|i| vec![Value::from(if i % 2 == 0 { "open" } else { "paid" })])
            .collect();
        let ds = dataset(&["status"], rows);
        let summary = SchemaSummary::profile(&ds);
        assert_eq!(summary.columns[0].inferred_type, InferredType::Categorical);
    }

    #[test]
    fn test_text_column_when_too_distinct() {
        let rows: Vec<Vec<Value>> = (0..10)
            .map(|i| vec![Value::from(format!("memo {i}"))])
            .collect();
        let ds = dataset(&["memo"], rows);
        let summary = SchemaSummary::profile(&ds);
        assert_eq!(summary.columns[0].inferred_type, InferredType::Text);
    }

    #[test]
    fn test_all_null_column_is_unknown() {
        let ds = dataset(&["empty"], vec![vec![Value::Null], vec![Value::Null]]);
        let summary = SchemaSummary::profile(&ds);

        let col = &summary.columns[0];
        assert_eq!(col.inferred_type, InferredType::Unknown);
        assert_eq!(col.null_count, 2);
        assert_eq!(col.distinct_count, 0);
    }

    #[test]
    fn test_profile_never_fails_on_empty_dataset() {
        let summary = SchemaSummary::profile(&Dataset::default());
        assert!(summary.columns.is_empty());
        assert_eq!(summary.row_count, 0);
    }

    #[test]
    fn test_sample_values_bounded() {
        let rows: Vec<Vec<Value>> = (0..50).map(|i| vec![Value::Int(i)]).collect();
        let ds = dataset(&["n"], rows);
        let summary = SchemaSummary::profile(&ds);
        assert_eq!(summary.columns[0].sample_values.len(), MAX_SAMPLE_VALUES);
    }

    #[test]
    fn test_contains_column_case_insensitive() {
        let ds = dataset(&["Amount"], vec![vec![Value::Int(1)]]);
        let summary = SchemaSummary::profile(&ds);
        assert!(summary.contains_column("amount"));
        assert!(summary.contains_column("AMOUNT"));
        assert!(!summary.contains_column("total"));
    }

    #[test]
    fn test_format_for_llm() {
        let ds = dataset(
            &["amount", "Due Date"],
            vec![vec![Value::Float(1.0), Value::from("2024-01-02")]],
        );
        let summary = SchemaSummary::profile(&ds);
        let text = summary.format_for_llm("data");

        assert!(text.contains("Table: data"));
        assert!(text.contains("amount (numeric)"));
        assert!(text.contains("[Due Date] (temporal)"));
        assert!(text.contains("Total rows: 1"));
        assert!(text.contains("square brackets"));
    }

    #[test]
    fn test_format_for_llm_no_bracket_note_without_spaces() {
        let ds = dataset(&["amount"], vec![vec![Value::Int(1)]]);
        let summary = SchemaSummary::profile(&ds);
        assert!(!summary.format_for_llm("data").contains("square brackets"));
    }

    #[test]
    fn test_content_hash_changes_with_schema() {
        let a = SchemaSummary::profile(&dataset(&["x"], vec![vec![Value::Int(1)]]));
        let b = SchemaSummary::profile(&dataset(&["y"], vec![vec![Value::Int(1)]]));
        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), a.content_hash());
    }

    #[test]
    fn test_is_temporal_patterns() {
        assert!(is_temporal("2024-01-02"));
        assert!(is_temporal("2024-01-02 10:30:00"));
        assert!(is_temporal("2024-01-02T10:30"));
        assert!(is_temporal("2024/01/02"));
        assert!(is_temporal("1/2/2024"));
        assert!(!is_temporal("hello"));
        assert!(!is_temporal("2024"));
        assert!(!is_temporal(""));
    }

    #[test]
    fn test_normalize_temporal() {
        assert_eq!(
            normalize_temporal("2024-01-02").as_deref(),
            Some("2024-01-02")
        );
        assert_eq!(
            normalize_temporal("2024/01/02").as_deref(),
            Some("2024-01-02")
        );
        assert_eq!(
            normalize_temporal("1/2/2024").as_deref(),
            Some("2024-01-02")
        );
        assert_eq!(
            normalize_temporal("2024-01-02T10:30:00").as_deref(),
            Some("2024-01-02 10:30:00")
        );
        assert_eq!(normalize_temporal("not a date"), None);
    }
}
