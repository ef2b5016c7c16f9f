//! SQL Generation Adapter.
//!
//! Turns a natural-language question into a `SqlCandidate` via the language
//! model. Produce-only: candidates leave here unvalidated and must pass the
//! safety validator before execution.

use tracing::debug;

use crate::error::{Result, TabletalkError};
use crate::llm::{build_sql_generation_messages, extract_sql, LlmClient};
use crate::profile::SchemaSummary;
use crate::safety::SqlCandidate;

/// Generates SQL candidates from natural-language questions.
///
/// Holds the schema text and row sample injected into every generation
/// prompt; both are fixed for the lifetime of a session.
#[derive(Debug)]
pub struct SqlGenerator {
    schema: SchemaSummary,
    table_name: String,
    sample: String,
}

impl SqlGenerator {
    /// Creates a generator for the given schema, table name, and prompt
    /// sample block.
    pub fn new(schema: SchemaSummary, table_name: impl Into<String>, sample: String) -> Self {
        Self {
            schema,
            table_name: table_name.into(),
            sample,
        }
    }

    /// Generates an unvalidated SQL candidate for a question.
    ///
    /// Fails when the model call fails or when nothing statement-shaped can
    /// be extracted from the response.
    pub async fn generate(&self, llm: &dyn LlmClient, query: &str) -> Result<SqlCandidate> {
        let messages =
            build_sql_generation_messages(&self.schema, &self.table_name, &self.sample, query);

        let response = llm
            .complete(&messages)
            .await
            .map_err(|e| TabletalkError::generation(format!("SQL generation failed: {e}")))?;

        let sql = extract_sql(&response).ok_or_else(|| {
            TabletalkError::generation("Model response contained no SQL statement")
        })?;

        debug!(sql = %sql, "generated SQL candidate");
        Ok(SqlCandidate::new(sql))
    }
}
