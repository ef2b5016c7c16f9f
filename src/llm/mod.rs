//! LLM integration for Tabletalk.
//!
//! The language model is an external text-completion service. The core
//! consumes two call shapes through one trait: SQL generation and result
//! interpretation (plus the contextual and plot-suggestion prompts). Calls
//! are fire-and-forget; no streaming contract is required.

pub mod mock;
pub mod openai;
pub mod parser;
pub mod prompt;
pub mod types;

pub use mock::{FailingLlmClient, MockLlmClient};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use parser::extract_sql;
pub use prompt::{
    build_contextual_messages, build_interpretation_messages, build_plot_messages,
    build_sql_generation_messages, PromptCache,
};
pub use types::{Conversation, Message, Role};

use async_trait::async_trait;

use crate::error::Result;

/// Trait for LLM clients that can generate completions.
///
/// Implementations must be thread-safe (Send + Sync) to support async operations.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generates a completion for the given messages.
    ///
    /// Returns the complete response as a single string.
    async fn complete(&self, messages: &[Message]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_implements_trait() {
        let client: Box<dyn LlmClient> = Box::new(MockLlmClient::new());
        let messages = vec![Message::user("average amount by status")];
        let response = client.complete(&messages).await.unwrap();
        assert!(response.contains("SELECT"));
    }
}
