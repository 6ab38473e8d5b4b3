//! mimicbot: periodically predicts the next message in a Discord channel
//! using a locally hosted Ollama model, and posts the prediction back.

pub mod config;
pub mod conversation;
pub mod cycle;
pub mod error;
pub mod llm;
pub mod messaging;

pub use cycle::{CycleOutcome, GenerationCycle};
pub use error::{Error, Result};

use chrono::{DateTime, Utc};

/// Discord snowflake for a channel.
pub type ChannelId = u64;

/// Discord snowflake for a user.
pub type UserId = u64;

/// The bot's own account, learned from the gateway ready event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: UserId,
    pub name: String,
}

impl std::fmt::Display for BotIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (ID: {})", self.name, self.id)
    }
}

/// A channel message as read from history, already reduced to the fields the
/// transcript needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub author_id: UserId,
    pub author_name: String,
    /// Message text with mentions resolved to readable names.
    pub content: String,
    pub created_at: DateTime<Utc>,
}
