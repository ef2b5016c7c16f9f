//! Mock LLM clients for testing.
//!
//! Provide deterministic responses based on input patterns so the pipeline
//! can be exercised without real API calls.

use async_trait::async_trait;

use crate::error::{Result, TabletalkError};
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned responses based on input patterns.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response), checked first.
    custom_responses: Vec<(String, String)>,
}

impl MockLlmClient {
    /// Creates a new mock client with default responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the last user message contains `pattern`, the mock returns
    /// `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Generates a mock response based on the input.
    fn mock_response(&self, input: &str) -> String {
        let input_lower = input.to_lowercase();

        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if input_lower.contains("interpret these query results") {
            return "The results show a clear breakdown across the requested groups.".to_string();
        }

        if input_lower.contains("average") && input_lower.contains("status") {
            return "```sql\nSELECT status, AVG(amount) FROM data GROUP BY status;\n```"
                .to_string();
        }

        if input_lower.contains("count") {
            return "```sql\nSELECT COUNT(*) FROM data;\n```".to_string();
        }

        if input_lower.contains("drop") {
            return "DROP TABLE data".to_string();
        }

        if input_lower.contains("plot") || input_lower.contains("chart") {
            return "**Recommended Visualization:** Bar Chart\n**Configuration:**\n- X-axis: status\n- Y-axis: amount\n- Title: Amount by Status".to_string();
        }

        "Based on the loaded data, here is what I can tell you.".to_string()
    }

    /// Extracts the last user message content from a message list.
    fn extract_user_input(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let input = Self::extract_user_input(messages);
        Ok(self.mock_response(&input))
    }
}

/// Mock LLM client whose every call fails, for exercising failure paths.
#[derive(Debug, Clone, Default)]
pub struct FailingLlmClient;

impl FailingLlmClient {
    /// Creates a new failing client.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn complete(&self, _messages: &[Message]) -> Result<String> {
        Err(TabletalkError::llm("Simulated LLM failure"))
    }
}
