//! Prompt construction for LLM requests.
//!
//! Builds the four prompt shapes the pipeline uses: SQL generation, result
//! interpretation, contextual chat, and plot suggestion. All of them inject
//! the schema summary text so answers stay grounded in the loaded dataset.

use crate::llm::types::{Conversation, Message};
use crate::profile::SchemaSummary;
use crate::store::ExecutionResult;
use std::sync::Arc;

/// Rows of a result set included verbatim in the interpretation prompt.
const MAX_INTERPRETATION_ROWS: usize = 50;

/// System prompt for SQL generation.
const SQL_SYSTEM_PROMPT: &str =
    "You are a SQL expert. Generate only valid SQLite SQL queries, nothing else.";

/// User prompt template for SQL generation.
const SQL_PROMPT_TEMPLATE: &str = r#"Convert this natural language question to a simple SQL query.

{schema}
Question: {query}

Rules:
- Use table name: {table}
- Keep the query simple and safe
- Use LIMIT 100 for large results
- Only use SELECT statements
- Column names with spaces MUST be in square brackets: [Column Name]
- Return ONLY the raw SQL query with NO additional text, explanations, or formatting
"#;

/// System prompt for contextual answers about the dataset.
const CONTEXTUAL_SYSTEM_TEMPLATE: &str = r#"You are an expert data analyst assistant helping users understand and analyze their tabular data.

DATA CONTEXT:
{context}

INSTRUCTIONS:
- Answer questions about the data using the context provided above
- Provide insights, patterns, and analysis based on the data
- Be concise but thorough in your explanations
- If you cannot answer based on the provided context, clearly state what additional information would be needed"#;

/// System prompt for plot suggestions.
const PLOT_SYSTEM_TEMPLATE: &str = r#"You are a data visualization expert helping users create meaningful charts.

DATA CONTEXT:
{context}

TASK: Based on the user's request and the available data, suggest the most appropriate visualization.

RESPONSE FORMAT:
**Recommended Visualization:** [plot type]
**Configuration:**
- X-axis: [column name]
- Y-axis: [column name, if applicable]
- Title: [suggested title]"#;

/// Builds the message list for a SQL generation request.
///
/// Includes the schema text and a bounded sample of rows for grounding.
pub fn build_sql_generation_messages(
    schema: &SchemaSummary,
    table_name: &str,
    sample: &str,
    query: &str,
) -> Vec<Message> {
    let schema_text = format!(
        "{}\nSample data (first rows):\n{}\n",
        schema.format_for_llm(table_name),
        sample
    );
    let prompt = SQL_PROMPT_TEMPLATE
        .replace("{schema}", &schema_text)
        .replace("{query}", query)
        .replace("{table}", table_name);

    vec![Message::system(SQL_SYSTEM_PROMPT), Message::user(prompt)]
}

/// Builds the message list for interpreting an execution result.
pub fn build_interpretation_messages(query: &str, result: &ExecutionResult) -> Vec<Message> {
    vec![
        Message::system(
            "You are a data analyst. Interpret these SQL query results in a clear, concise way.",
        ),
        Message::user(format!(
            "Please interpret these query results:\n\n{}",
            format_result_for_llm(result, query)
        )),
    ]
}

/// Builds the message list for a contextual answer.
///
/// The user message is the original query, unmodified. When the analytical
/// route failed first, the failure note rides along in the system prompt so
/// the answer can mention why structured analysis was not available.
pub fn build_contextual_messages(
    system_prompt: &str,
    conversation: &Conversation,
    query: &str,
    failure_note: Option<&str>,
) -> Vec<Message> {
    let mut system = system_prompt.to_string();
    if let Some(note) = failure_note {
        system.push_str(&format!(
            "\n\nNOTE: A structured SQL query was attempted for this question but could not be used ({}). If relevant, mention this briefly.",
            note
        ));
    }

    let mut messages = Vec::with_capacity(conversation.len() + 2);
    messages.push(Message::system(system));
    messages.extend(conversation.messages().iter().cloned());
    messages.push(Message::user(query));
    messages
}

/// Builds the contextual system prompt with the dataset context injected.
pub fn build_contextual_system_prompt(schema: &SchemaSummary, table_name: &str) -> String {
    CONTEXTUAL_SYSTEM_TEMPLATE.replace("{context}", &schema.format_for_llm(table_name))
}

/// Builds the message list for a plot suggestion.
pub fn build_plot_messages(
    schema: &SchemaSummary,
    table_name: &str,
    query: &str,
) -> Vec<Message> {
    let system = PLOT_SYSTEM_TEMPLATE.replace("{context}", &schema.format_for_llm(table_name));
    vec![Message::system(system), Message::user(query)]
}

/// Formats an execution result as text for the interpretation prompt.
///
/// Large results are cut down for token efficiency; the summary line keeps
/// the true row count visible.
pub fn format_result_for_llm(result: &ExecutionResult, query: &str) -> String {
    if result.rows.is_empty() {
        return format!("Query: {}\n\nNo results found.", query);
    }

    let shown = result.rows.len().min(MAX_INTERPRETATION_ROWS);
    let sample_note = if result.rows.len() > MAX_INTERPRETATION_ROWS {
        format!("\n(Showing first {} of {} results)", shown, result.rows.len())
    } else {
        String::new()
    };

    let mut table = result.columns.join(" | ");
    table.push('\n');
    for row in result.rows.iter().take(MAX_INTERPRETATION_ROWS) {
        let line = row
            .iter()
            .map(|v| v.to_display_string())
            .collect::<Vec<_>>()
            .join(" | ");
        table.push_str(&line);
        table.push('\n');
    }

    format!(
        "Query: {}\n\nResults:{}\n{}\nSummary: {} total rows returned",
        query, sample_note, table, result.row_count
    )
}

/// Cache for the contextual system prompt.
///
/// Avoids rebuilding the schema text on every request when the schema has
/// not changed.
#[derive(Debug, Default)]
pub struct PromptCache {
    /// Hash of the schema used to build the cached prompt.
    schema_hash: u64,
    /// Cached system prompt.
    system_prompt: Option<Arc<str>>,
}

impl PromptCache {
    /// Creates a new empty prompt cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cached system prompt, rebuilding if the schema has changed.
    pub fn get_or_build(&mut self, schema: &SchemaSummary, table_name: &str) -> Arc<str> {
        let hash = schema.content_hash();
        if self.schema_hash != hash || self.system_prompt.is_none() {
            self.schema_hash = hash;
            self.system_prompt = Some(Arc::from(build_contextual_system_prompt(
                schema, table_name,
            )));
        }
        Arc::clone(self.system_prompt.as_ref().expect("prompt was just built"))
    }

    /// Invalidates the cache, forcing a rebuild on next access.
    pub fn invalidate(&mut self) {
        self.schema_hash = 0;
        self.system_prompt = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Value};
    use crate::llm::types::Role;
    use crate::store::ExecutionResult;

    fn sample_schema() -> SchemaSummary {
        let ds = Dataset::new(
            vec!["amount".to_string(), "status".to_string()],
            vec![
                vec![Value::Float(10.0), Value::from("paid")],
                vec![Value::Float(5.0), Value::from("open")],
            ],
        );
        SchemaSummary::profile(&ds)
    }

    fn sample_result() -> ExecutionResult {
        ExecutionResult::with_data(
            vec!["status".to_string(), "avg".to_string()],
            vec![
                vec![Value::from("paid"), Value::Float(10.0)],
                vec![Value::from("open"), Value::Float(5.0)],
            ],
        )
    }

    #[test]
    fn test_sql_generation_messages() {
        let schema = sample_schema();
        let messages =
            build_sql_generation_messages(&schema, "data", "amount | status\n10 | paid\n", "avg?");

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("Table: data"));
        assert!(messages[1].content.contains("Sample data"));
        assert!(messages[1].content.contains("Question: avg?"));
        assert!(messages[1].content.contains("Only use SELECT statements"));
    }

    #[test]
    fn test_interpretation_messages_contain_result() {
        let messages = build_interpretation_messages("average by status", &sample_result());
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("status | avg"));
        assert!(messages[1].content.contains("2 total rows"));
    }

    #[test]
    fn test_contextual_messages_query_unmodified() {
        let mut conv = Conversation::with_max_exchanges(10);
        conv.add_user("earlier question");
        conv.add_assistant("earlier answer");

        let messages = build_contextual_messages("system text", &conv, "  my query  ", None);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[3].content, "  my query  ");
    }

    #[test]
    fn test_contextual_messages_with_failure_note() {
        let conv = Conversation::with_max_exchanges(10);
        let messages =
            build_contextual_messages("system text", &conv, "q", Some("unsafe_verb rejection"));

        assert!(messages[0].content.contains("unsafe_verb rejection"));
        assert_eq!(messages.last().unwrap().content, "q");
    }

    #[test]
    fn test_plot_messages() {
        let schema = sample_schema();
        let messages = build_plot_messages(&schema, "data", "plot amounts");
        assert!(messages[0].content.contains("visualization expert"));
        assert!(messages[0].content.contains("Table: data"));
        assert_eq!(messages[1].content, "plot amounts");
    }

    #[test]
    fn test_format_result_empty() {
        let result = ExecutionResult::with_data(vec!["a".to_string()], vec![]);
        let text = format_result_for_llm(&result, "q");
        assert!(text.contains("No results found"));
    }

    #[test]
    fn test_format_result_truncates_large_results() {
        let rows: Vec<Vec<Value>> = (0..80).map(|i| vec![Value::Int(i)]).collect();
        let result = ExecutionResult::with_data(vec!["n".to_string()], rows);
        let text = format_result_for_llm(&result, "q");
        assert!(text.contains("Showing first 50 of 80"));
    }

    #[test]
    fn test_prompt_cache_reuses_until_schema_changes() {
        let schema = sample_schema();
        let mut cache = PromptCache::new();

        let a = cache.get_or_build(&schema, "data");
        let b = cache.get_or_build(&schema, "data");
        assert!(Arc::ptr_eq(&a, &b));

        cache.invalidate();
        let c = cache.get_or_build(&schema, "data");
        assert_eq!(&*a, &*c);
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
