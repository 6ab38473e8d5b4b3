//! Top-level error types for mimicbot.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("missing required config key: {0}")]
    MissingKey(String),
}

/// Local model endpoint errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),

    #[error("generation task aborted: {0}")]
    TaskAborted(String),
}

/// Chat platform errors.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("discord client failed: {0}")]
    Client(String),

    #[error("channel {id} not found: {reason}")]
    ChannelNotFound { id: u64, reason: String },

    #[error("channel {id} is not messageable (kind: {kind})")]
    NotMessageable { id: u64, kind: String },

    #[error("failed to fetch history from channel {id}: {reason}")]
    HistoryFetch { id: u64, reason: String },

    #[error("failed to send to channel {id}: {reason}")]
    Send { id: u64, reason: String },

    #[error("gateway closed before the ready event")]
    NeverReady,
}

/// Last-run marker errors.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to read marker {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to write marker {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}
