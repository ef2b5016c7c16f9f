//! Message types for LLM communication.

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message providing context and instructions.
    System,
    /// User message (human input).
    User,
    /// Assistant message (LLM response).
    Assistant,
}

impl Role {
    /// Returns the role as a string for API requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

impl Message {
    /// Creates a new message with the given role and content.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A conversation consisting of multiple messages.
///
/// Maintains bounded history for context in contextual answers: the oldest
/// complete exchanges are dropped once the limit is exceeded, keeping token
/// usage in check.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Maximum number of exchanges to keep (each exchange = user + assistant).
    max_exchanges: usize,
}

impl Conversation {
    /// Creates a new empty conversation with the given exchange limit.
    pub fn with_max_exchanges(max_exchanges: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_exchanges,
        }
    }

    /// Adds a message to the conversation.
    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
        self.trim_to_limit();
    }

    /// Adds a user message to the conversation.
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.add(Message::user(content));
    }

    /// Adds an assistant message to the conversation.
    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.add(Message::assistant(content));
    }

    /// Returns all messages in the conversation.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Clears all messages from the conversation.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Returns the number of messages in the conversation.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the conversation has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drops the oldest complete exchanges until within the limit.
    fn trim_to_limit(&mut self) {
        while self.exchange_count() > self.max_exchanges {
            let Some(first_user) = self
                .messages
                .iter()
                .position(|m| m.role == Role::User)
            else {
                break;
            };
            if first_user + 1 < self.messages.len()
                && self.messages[first_user + 1].role == Role::Assistant
            {
                self.messages.remove(first_user);
                self.messages.remove(first_user);
            } else {
                break;
            }
        }
    }

    fn exchange_count(&self) -> usize {
        let mut count = 0;
        let mut i = 0;
        while i + 1 < self.messages.len() {
            if self.messages[i].role == Role::User && self.messages[i + 1].role == Role::Assistant {
                count += 1;
                i += 2;
            } else {
                i += 1;
            }
        }
        count
    }
}
