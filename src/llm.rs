//! Local model access.

pub mod ollama;

pub use ollama::OllamaClient;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Conversation role understood by the chat endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A chat-completion backend. Returns the generated text.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync + 'static {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Run one non-streaming chat completion.
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String>;
}
