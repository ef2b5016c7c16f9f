//! Query pipeline and session context.
//!
//! A `Session` holds everything derived from one loaded dataset: the schema
//! summary, the relational store projection, the SQL generator/validator
//! pair, and the conversation history for contextual answers. It is created
//! on ingestion, replaced wholesale on re-upload, and torn down on session
//! end. `handle_query` is the single entry point: classify, dispatch, and
//! always come back with a terminal `QueryOutcome`.

use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::dataset::Dataset;
use crate::error::{Result, TabletalkError};
use crate::generate::SqlGenerator;
use crate::llm::{
    build_interpretation_messages, build_plot_messages, Conversation, LlmClient, PromptCache,
};
use crate::profile::SchemaSummary;
use crate::route::{classify_query, Route};
use crate::safety::SqlValidator;
use crate::store::{DataStore, ExecutionResult, SqliteStore};

/// Terminal outcome of one query, returned to the caller.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// The outcome payload.
    pub kind: OutcomeKind,
    /// The route the classifier chose for this query.
    pub route_taken: Route,
    /// True only when the analytical route failed and the answer came from
    /// the contextual fallback.
    pub fallback_occurred: bool,
}

/// Outcome payload variants.
#[derive(Debug, Clone)]
pub enum OutcomeKind {
    /// A validated query executed against the store.
    SqlResult {
        /// The executed SQL statement.
        sql: String,
        /// The (possibly truncated) result set.
        result: ExecutionResult,
        /// Model interpretation of the result, when available.
        narrative: Option<String>,
    },
    /// A free-form answer grounded in the schema context.
    ContextualAnswer {
        /// The answer text.
        text: String,
    },
    /// A visualization suggestion.
    PlotSpec {
        /// The suggestion text (plot type, axes, title).
        suggestion: String,
    },
    /// No route produced an answer.
    Error {
        /// What failed, naming the route.
        message: String,
    },
}

impl OutcomeKind {
    /// Returns the stable wire name for this outcome kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SqlResult { .. } => "SQL_RESULT",
            Self::ContextualAnswer { .. } => "CONTEXTUAL_ANSWER",
            Self::PlotSpec { .. } => "PLOT_SPEC",
            Self::Error { .. } => "ERROR",
        }
    }
}

/// Session-scoped context for one loaded dataset.
pub struct Session {
    schema: SchemaSummary,
    config: CoreConfig,
    store: Box<dyn DataStore>,
    llm: Box<dyn LlmClient>,
    generator: SqlGenerator,
    validator: SqlValidator,
    conversation: Conversation,
    prompt_cache: PromptCache,
}

impl Session {
    /// Opens a session over a dataset: profiles it, projects it into an
    /// in-memory store, and wires up the pipeline components.
    pub async fn open(
        dataset: &Dataset,
        llm: Box<dyn LlmClient>,
        config: CoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        let schema = SchemaSummary::profile(dataset);
        let store = SqliteStore::load(dataset, &schema, &config).await?;
        Ok(Self::assemble(dataset, schema, Box::new(store), llm, config))
    }

    /// Builds a session around an existing store.
    pub fn from_parts(
        dataset: &Dataset,
        store: Box<dyn DataStore>,
        llm: Box<dyn LlmClient>,
        config: CoreConfig,
    ) -> Self {
        let schema = SchemaSummary::profile(dataset);
        Self::assemble(dataset, schema, store, llm, config)
    }

    fn assemble(
        dataset: &Dataset,
        schema: SchemaSummary,
        store: Box<dyn DataStore>,
        llm: Box<dyn LlmClient>,
        config: CoreConfig,
    ) -> Self {
        let sample = dataset.format_sample(config.sample_rows);
        let generator = SqlGenerator::new(schema.clone(), &config.table_name, sample);
        let validator = SqlValidator::new(schema.clone(), &config.table_name);
        let conversation = Conversation::with_max_exchanges(config.max_exchanges);

        Self {
            schema,
            config,
            store,
            llm,
            generator,
            validator,
            conversation,
            prompt_cache: PromptCache::new(),
        }
    }

    /// Returns the schema summary for the loaded dataset.
    pub fn schema(&self) -> &SchemaSummary {
        &self.schema
    }

    /// Handles one query end to end. Always returns a terminal outcome;
    /// internal failures surface as fallback answers or `Error` outcomes,
    /// never as panics or hangs.
    pub async fn handle_query(&mut self, query: &str) -> QueryOutcome {
        let decision = classify_query(query);
        info!(route = %decision.route, "classified query");

        match decision.route {
            Route::Plot => self.handle_plot(query).await,
            Route::Analytical => self.handle_analytical(query).await,
            Route::Contextual => self.handle_contextual(query).await,
        }
    }

    /// Closes the session and its store.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }

    async fn handle_plot(&mut self, query: &str) -> QueryOutcome {
        let messages = build_plot_messages(&self.schema, &self.config.table_name, query);

        match self.llm.complete(&messages).await {
            Ok(suggestion) => QueryOutcome {
                kind: OutcomeKind::PlotSpec { suggestion },
                route_taken: Route::Plot,
                fallback_occurred: false,
            },
            Err(e) => {
                warn!(error = %e, "plot suggestion failed");
                QueryOutcome {
                    kind: OutcomeKind::Error {
                        message: format!("Plot route failed: {e}"),
                    },
                    route_taken: Route::Plot,
                    fallback_occurred: false,
                }
            }
        }
    }

    async fn handle_analytical(&mut self, query: &str) -> QueryOutcome {
        match self.run_analytical(query).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "analytical route failed, falling back to contextual");
                self.contextual_fallback(query, &e).await
            }
        }
    }

    /// Generation, validation, execution, interpretation. Any error here
    /// triggers the single-hop contextual fallback in the caller.
    async fn run_analytical(&mut self, query: &str) -> Result<QueryOutcome> {
        let candidate = self.generator.generate(self.llm.as_ref(), query).await?;
        let candidate = self.validator.validate(candidate);

        if !candidate.validated {
            let reason = candidate
                .rejection_reason
                .map(|r| r.as_str())
                .unwrap_or("unknown");
            return Err(TabletalkError::validation(format!(
                "Generated SQL was rejected ({reason})"
            )));
        }

        let result = self.store.execute_query(&candidate.raw_text).await?;
        if result.is_empty() {
            return Err(TabletalkError::execution("Query returned no rows"));
        }

        // Interpretation is best-effort: the result set already answers the
        // question, so a failed narrative call degrades instead of failing.
        let narrative = match self
            .llm
            .complete(&build_interpretation_messages(query, &result))
            .await
        {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "result interpretation failed");
                None
            }
        };

        Ok(QueryOutcome {
            kind: OutcomeKind::SqlResult {
                sql: candidate.raw_text,
                result,
                narrative,
            },
            route_taken: Route::Analytical,
            fallback_occurred: false,
        })
    }

    async fn handle_contextual(&mut self, query: &str) -> QueryOutcome {
        match self.contextual_answer(query, None).await {
            Ok(text) => QueryOutcome {
                kind: OutcomeKind::ContextualAnswer { text },
                route_taken: Route::Contextual,
                fallback_occurred: false,
            },
            Err(e) => QueryOutcome {
                kind: OutcomeKind::Error {
                    message: format!("Contextual route failed: {e}"),
                },
                route_taken: Route::Contextual,
                fallback_occurred: false,
            },
        }
    }

    /// Single-hop fallback from the analytical route. The contextual call
    /// receives the original query text unmodified; the failure rides along
    /// in the system prompt only.
    async fn contextual_fallback(&mut self, query: &str, failure: &TabletalkError) -> QueryOutcome {
        let note = failure.to_string();
        match self.contextual_answer(query, Some(&note)).await {
            Ok(text) => QueryOutcome {
                kind: OutcomeKind::ContextualAnswer { text },
                route_taken: Route::Analytical,
                fallback_occurred: true,
            },
            Err(e) => QueryOutcome {
                kind: OutcomeKind::Error {
                    message: format!(
                        "Analytical route failed ({failure}) and contextual fallback failed ({e})"
                    ),
                },
                route_taken: Route::Analytical,
                fallback_occurred: true,
            },
        }
    }

    async fn contextual_answer(
        &mut self,
        query: &str,
        failure_note: Option<&str>,
    ) -> Result<String> {
        let system = self
            .prompt_cache
            .get_or_build(&self.schema, &self.config.table_name);
        let messages = crate::llm::build_contextual_messages(
            &system,
            &self.conversation,
            query,
            failure_note,
        );

        let text = self.llm.complete(&messages).await?;

        self.conversation.add_user(query);
        self.conversation.add_assistant(text.as_str());

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;
    use crate::llm::{FailingLlmClient, MockLlmClient};
    use crate::store::{FailingDataStore, MockDataStore};

    fn sample_dataset() -> Dataset {
        Dataset::new(
            vec!["amount".to_string(), "status".to_string()],
            vec![
                vec![Value::Float(10.0), Value::from("paid")],
                vec![Value::Float(5.0), Value::from("open")],
            ],
        )
    }

    fn mock_session(llm: Box<dyn LlmClient>, store: Box<dyn DataStore>) -> Session {
        Session::from_parts(&sample_dataset(), store, llm, CoreConfig::default())
    }

    #[tokio::test]
    async fn test_analytical_success_with_mock_store() {
        let mut session = mock_session(
            Box::new(MockLlmClient::new()),
            Box::new(MockDataStore::with_sample_rows()),
        );

        let outcome = session
            .handle_query("What is the average amount by status?")
            .await;

        assert_eq!(outcome.route_taken, Route::Analytical);
        assert!(!outcome.fallback_occurred);
        match outcome.kind {
            OutcomeKind::SqlResult { sql, result, narrative } => {
                assert!(sql.contains("GROUP BY status"));
                assert_eq!(result.row_count, 2);
                assert!(narrative.is_some());
            }
            other => panic!("expected SqlResult, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_execution_failure_falls_back_to_contextual() {
        let mut session = mock_session(
            Box::new(MockLlmClient::new()),
            Box::new(FailingDataStore::new()),
        );

        let outcome = session
            .handle_query("What is the average amount by status?")
            .await;

        assert!(outcome.fallback_occurred);
        assert_eq!(outcome.route_taken, Route::Analytical);
        assert!(matches!(outcome.kind, OutcomeKind::ContextualAnswer { .. }));
    }

    #[tokio::test]
    async fn test_empty_result_falls_back() {
        let mut session = mock_session(
            Box::new(MockLlmClient::new()),
            Box::new(MockDataStore::new()),
        );

        let outcome = session.handle_query("count the widgets").await;

        assert!(outcome.fallback_occurred);
        assert!(matches!(outcome.kind, OutcomeKind::ContextualAnswer { .. }));
    }

    #[tokio::test]
    async fn test_plot_route_no_fallback_on_failure() {
        let mut session = mock_session(
            Box::new(FailingLlmClient::new()),
            Box::new(MockDataStore::new()),
        );

        let outcome = session.handle_query("plot the amounts").await;

        assert_eq!(outcome.route_taken, Route::Plot);
        assert!(!outcome.fallback_occurred);
        assert!(matches!(outcome.kind, OutcomeKind::Error { .. }));
    }

    #[tokio::test]
    async fn test_contextual_route_terminal_error_on_failure() {
        let mut session = mock_session(
            Box::new(FailingLlmClient::new()),
            Box::new(MockDataStore::new()),
        );

        let outcome = session.handle_query("tell me about this data").await;

        assert_eq!(outcome.route_taken, Route::Contextual);
        assert!(!outcome.fallback_occurred);
        match outcome.kind {
            OutcomeKind::Error { message } => {
                assert!(message.contains("Contextual route failed"));
            }
            other => panic!("expected Error, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_total_llm_failure_on_analytical_reports_both() {
        let mut session = mock_session(
            Box::new(FailingLlmClient::new()),
            Box::new(MockDataStore::new()),
        );

        let outcome = session.handle_query("average amount").await;

        assert!(outcome.fallback_occurred);
        match outcome.kind {
            OutcomeKind::Error { message } => {
                assert!(message.contains("Analytical route failed"));
                assert!(message.contains("contextual fallback failed"));
            }
            other => panic!("expected Error, got {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_contextual_conversation_grows() {
        let mut session = mock_session(
            Box::new(MockLlmClient::new()),
            Box::new(MockDataStore::new()),
        );

        session.handle_query("tell me about the data").await;
        session.handle_query("anything else interesting?").await;

        // Two exchanges of user + assistant messages.
        assert_eq!(session.conversation.len(), 4);
    }

    #[tokio::test]
    async fn test_outcome_kind_names() {
        assert_eq!(
            OutcomeKind::Error {
                message: String::new()
            }
            .name(),
            "ERROR"
        );
        assert_eq!(
            OutcomeKind::ContextualAnswer {
                text: String::new()
            }
            .name(),
            "CONTEXTUAL_ANSWER"
        );
    }
}
