//! Configuration loading and validation.
//!
//! Every setting is read once at startup. Sources, highest precedence first:
//! the process environment, a `.env` file found from the working directory,
//! and an optional TOML file whose keys are the lowercase variable names
//! (`channel_id = 123`). A blank value in a higher source falls through.

use crate::error::{ConfigError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_MODEL: &str = "llama3.2:latest";
const DEFAULT_STATE_FILE: &str = "last_run.txt";
const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
const DEFAULT_PERSONA: &str = "atreusion";
const DEFAULT_TICK_SECS: u64 = 3600;
const DEFAULT_NUM_THREAD: u32 = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// mimicbot configuration. Immutable for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord connection settings.
    pub discord: DiscordConfig,

    /// Local model settings.
    pub llm: LlmConfig,

    /// Generation cycle timing and state.
    pub cycle: CycleConfig,
}

/// Discord connection settings.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token. Never logged.
    pub token: String,

    /// The single channel the bot reads from and posts to.
    pub channel_id: u64,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

/// Ollama settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,

    /// Model identifier passed to `/api/chat`.
    pub model: String,

    /// Username whose next message the model predicts.
    pub persona: String,

    /// CPU threads used for inference.
    pub num_thread: u32,

    /// When false, the request pins inference to the CPU (`num_gpu: 0`).
    pub use_gpu: bool,

    /// HTTP timeout for a single generation request.
    pub timeout_secs: u64,
}

/// Generation cycle settings.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Path of the last-run marker file.
    pub state_file: PathBuf,

    /// Minimum seconds between executed cycles. 0 disables the debounce.
    pub min_interval_secs: u64,

    /// Timer period in seconds.
    pub tick_secs: u64,
}

impl Config {
    /// Load configuration from the process environment and `.env`.
    pub fn load() -> Result<Self> {
        let dotenv = discover_dotenv();
        Self::from_lookup(layered(env_value, &dotenv, None))
    }

    /// Load from a TOML file, with the environment and `.env` taking precedence.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source: Arc::new(source),
        })?;
        let table = parse_file_table(&raw).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })?;

        let dotenv = discover_dotenv();
        Self::from_lookup(layered(env_value, &dotenv, Some(&table)))
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("DISCORD_TOKEN")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ConfigError::MissingKey("DISCORD_TOKEN".into()))?;

        let channel_id: u64 = parse_or(&lookup, "CHANNEL_ID", 0)?;
        if channel_id == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CHANNEL_ID".into(),
                value: "0".into(),
                reason: "a non-zero channel id is required".into(),
            }
            .into());
        }

        let tick_secs: u64 = parse_or(&lookup, "TICK_SECS", DEFAULT_TICK_SECS)?;
        if tick_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TICK_SECS".into(),
                value: "0".into(),
                reason: "the timer period must be at least one second".into(),
            }
            .into());
        }

        let llm = LlmConfig {
            base_url: string_or(&lookup, "OLLAMA_HOST", DEFAULT_OLLAMA_HOST),
            model: string_or(&lookup, "MODEL_NAME", DEFAULT_MODEL),
            persona: string_or(&lookup, "PERSONA", DEFAULT_PERSONA),
            num_thread: parse_or(&lookup, "OLLAMA_NUM_THREAD", DEFAULT_NUM_THREAD)?,
            use_gpu: parse_bool_or(&lookup, "OLLAMA_USE_GPU", false)?,
            timeout_secs: parse_or(&lookup, "OLLAMA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
        };

        let cycle = CycleConfig {
            state_file: PathBuf::from(string_or(&lookup, "STATE_FILE", DEFAULT_STATE_FILE)),
            min_interval_secs: parse_or(&lookup, "INTERVAL", 0)?,
            tick_secs,
        };

        Ok(Self {
            discord: DiscordConfig { token, channel_id },
            llm,
            cycle,
        })
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Environment, then `.env`, then the config file.
fn layered<'a>(
    env: impl Fn(&str) -> Option<String> + 'a,
    dotenv: &'a HashMap<String, String>,
    table: Option<&'a toml::Table>,
) -> impl Fn(&str) -> Option<String> + 'a {
    move |key| {
        env(key)
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                dotenv
                    .get(key)
                    .filter(|value| !value.trim().is_empty())
                    .cloned()
            })
            .or_else(|| table.and_then(|table| table_value(table, key)))
    }
}

/// Read the nearest `.env`, walking up from the working directory.
/// The process environment is left untouched.
fn discover_dotenv() -> HashMap<String, String> {
    match dotenvy::dotenv_iter() {
        Ok(entries) => collect_dotenv(entries),
        Err(error) if error.not_found() => HashMap::new(),
        Err(error) => {
            tracing::warn!(%error, "ignoring unreadable .env file");
            HashMap::new()
        }
    }
}

fn collect_dotenv<R: std::io::Read>(entries: dotenvy::Iter<R>) -> HashMap<String, String> {
    entries
        .filter_map(|entry| match entry {
            Ok(pair) => Some(pair),
            Err(error) => {
                tracing::warn!(%error, "skipping malformed .env line");
                None
            }
        })
        .collect()
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    trimmed.parse::<T>().map_err(|error| {
        ConfigError::InvalidValue {
            key: key.into(),
            value: raw.clone(),
            reason: error.to_string(),
        }
        .into()
    })
}

fn parse_bool_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            value: raw,
            reason: "expected a boolean".into(),
        }
        .into()),
    }
}

fn parse_file_table(raw: &str) -> std::result::Result<toml::Table, String> {
    toml::from_str::<toml::Table>(raw).map_err(|error| error.to_string())
}

/// Look up `KEY` as `key` in the file table, rendering scalars as strings.
fn table_value(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(&key.to_ascii_lowercase())? {
        toml::Value::String(value) => Some(value.clone()),
        toml::Value::Integer(value) => Some(value.to_string()),
        toml::Value::Float(value) => Some(value.to_string()),
        toml::Value::Boolean(value) => Some(value.to_string()),
        other => {
            tracing::warn!(key, kind = other.type_str(), "ignoring non-scalar config value");
            None
        }
    }
}
