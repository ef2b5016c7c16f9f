//! Embedded SQLite store implementation.
//!
//! Projects a loaded dataset into a single in-memory table and executes
//! validated queries against it via sqlx.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::dataset::{Dataset, Value};
use crate::error::{Result, TabletalkError};
use crate::profile::{normalize_temporal, InferredType, SchemaSummary};
use crate::store::{DataStore, ExecutionResult};

/// Query timeout in seconds.
const QUERY_TIMEOUT_SECS: u64 = 30;

/// SQLite-backed store over an in-memory projection of the dataset.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    max_result_rows: usize,
}

impl SqliteStore {
    /// Creates an in-memory store and loads the dataset into it.
    ///
    /// Column affinities follow the profiled types: numeric columns become
    /// INTEGER or REAL, everything else TEXT. Temporal cells are normalized
    /// to ISO-8601 text so lexicographic ordering matches chronological
    /// ordering.
    pub async fn load(
        dataset: &Dataset,
        schema: &SchemaSummary,
        config: &CoreConfig,
    ) -> Result<Self> {
        // Every pooled connection to ":memory:" would get its own empty
        // database, so the pool is pinned to a single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| TabletalkError::execution(format!("Failed to open store: {e}")))?;

        let store = Self {
            pool,
            max_result_rows: config.max_result_rows,
        };
        store.create_table(dataset, schema, &config.table_name).await?;
        store.insert_rows(dataset, schema, &config.table_name).await?;

        debug!(
            rows = dataset.row_count(),
            columns = dataset.columns.len(),
            table = %config.table_name,
            "loaded dataset into store"
        );

        Ok(store)
    }

    async fn create_table(
        &self,
        dataset: &Dataset,
        schema: &SchemaSummary,
        table_name: &str,
    ) -> Result<()> {
        let column_defs: Vec<String> = schema
            .columns
            .iter()
            .enumerate()
            .map(|(i, profile)| {
                format!(
                    "{} {}",
                    quote_identifier(&profile.name),
                    column_affinity(dataset, i, profile.inferred_type)
                )
            })
            .collect();

        let create_sql = format!(
            "CREATE TABLE {} ({})",
            quote_identifier(table_name),
            column_defs.join(", ")
        );

        sqlx::query(&create_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| TabletalkError::execution(format!("Failed to create table: {e}")))?;

        Ok(())
    }

    async fn insert_rows(
        &self,
        dataset: &Dataset,
        schema: &SchemaSummary,
        table_name: &str,
    ) -> Result<()> {
        if dataset.is_empty() {
            return Ok(());
        }

        let column_list = dataset
            .columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; dataset.columns.len()].join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table_name),
            column_list,
            placeholders
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TabletalkError::execution(format!("Failed to load rows: {e}")))?;

        for row in &dataset.rows {
            let mut query = sqlx::query(&insert_sql);
            for (i, value) in row.iter().enumerate() {
                let temporal = schema
                    .columns
                    .get(i)
                    .is_some_and(|p| p.inferred_type == InferredType::Temporal);
                query = bind_value(query, value, temporal);
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| TabletalkError::execution(format!("Failed to load rows: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| TabletalkError::execution(format!("Failed to load rows: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn execute_query(&self, sql: &str) -> Result<ExecutionResult> {
        let start = Instant::now();

        let result = tokio::time::timeout(
            Duration::from_secs(QUERY_TIMEOUT_SECS),
            sqlx::query(sql).fetch_all(&self.pool),
        )
        .await
        .map_err(|_| {
            TabletalkError::execution(format!("Query timed out after {QUERY_TIMEOUT_SECS} seconds"))
        })?
        .map_err(|e| TabletalkError::execution(format_query_error(e)))?;

        let execution_time = start.elapsed();

        let columns: Vec<String> = result
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let total_rows = result.len();
        let truncated = total_rows > self.max_result_rows;
        if truncated {
            warn!(
                "Query returned {} rows, truncating to {}",
                total_rows, self.max_result_rows
            );
        }

        let rows: Vec<Vec<Value>> = result
            .iter()
            .take(self.max_result_rows)
            .map(convert_row)
            .collect();
        let row_count = rows.len();

        Ok(ExecutionResult {
            columns,
            rows,
            row_count,
            total_rows: Some(total_rows),
            truncated,
            execution_time,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Quotes an identifier for SQLite, escaping embedded quotes.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Picks the declared column type for a profiled column.
fn column_affinity(dataset: &Dataset, index: usize, inferred: InferredType) -> &'static str {
    match inferred {
        InferredType::Numeric => {
            let has_float = dataset
                .column_values(index)
                .any(|v| matches!(v, Value::Float(_)));
            if has_float {
                "REAL"
            } else {
                "INTEGER"
            }
        }
        _ => "TEXT",
    }
}

type SqliteQuery<'q> =
    sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// Binds a cell value to an insert statement.
fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value, temporal: bool) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b.to_string()),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => {
            if temporal {
                query.bind(normalize_temporal(s).unwrap_or_else(|| s.clone()))
            } else {
                query.bind(s.clone())
            }
        }
    }
}

/// Converts a sqlx SqliteRow to a row of values.
fn convert_row(row: &SqliteRow) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a SqliteRow to a Value.
fn convert_value(row: &SqliteRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "NULL" => Value::Null,

        // TEXT and anything else decodes as a string
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Formats a query error, preferring the database's own message.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => format!("Query failed: {}", db_error.message()),
        None => format!("Query failed: {error}"),
    }
}
