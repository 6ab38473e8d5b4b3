//! The generation cycle: debounce, fetch history, predict, post.
//!
//! One call to [`GenerationCycle::run`] is one timer tick. Every outcome is
//! returned as a [`CycleOutcome`]; nothing inside a cycle propagates to the
//! caller as an error.

pub mod marker;
pub mod scheduler;

pub use marker::{LastRunMarker, unix_now};
pub use scheduler::Scheduler;

use crate::config::Config;
use crate::conversation::{build_prompt, build_transcript};
use crate::error::{LlmError, Result};
use crate::llm::{ChatMessage, ChatModel};
use crate::messaging::MessagingDyn;
use crate::UserId;

use std::sync::Arc;

/// Messages fetched per cycle.
pub const HISTORY_LIMIT: u8 = 100;

/// Longest reply posted, in characters.
pub const MAX_REPLY_CHARS: usize = 500;

/// Result of one timer tick.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The debounce interval has not elapsed. Nothing was read, written or sent.
    Skipped { elapsed_secs: f64 },
    /// A reply was posted.
    Completed {
        transcript_lines: usize,
        reply_chars: usize,
        truncated: bool,
    },
    /// The cycle started but did not post. Already logged by the scheduler.
    Failed { reason: String },
}

/// Details of a successful run.
#[derive(Debug)]
struct CycleReport {
    transcript_lines: usize,
    reply_chars: usize,
    truncated: bool,
}

/// Everything one cycle needs, fixed at startup.
pub struct GenerationCycle {
    channel: Arc<dyn MessagingDyn>,
    model: Arc<dyn ChatModel>,
    marker: LastRunMarker,
    bot_id: UserId,
    persona: String,
    min_interval_secs: u64,
}

impl std::fmt::Debug for GenerationCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationCycle")
            .field("marker", &self.marker)
            .field("bot_id", &self.bot_id)
            .field("persona", &self.persona)
            .field("min_interval_secs", &self.min_interval_secs)
            .finish_non_exhaustive()
    }
}

impl GenerationCycle {
    pub fn new(
        config: &Config,
        channel: Arc<dyn MessagingDyn>,
        model: Arc<dyn ChatModel>,
        bot_id: UserId,
    ) -> Self {
        Self {
            channel,
            model,
            marker: LastRunMarker::new(config.cycle.state_file.clone()),
            bot_id,
            persona: config.llm.persona.clone(),
            min_interval_secs: config.cycle.min_interval_secs,
        }
    }

    /// Run one tick against the current wall clock.
    pub async fn run(&self) -> CycleOutcome {
        self.run_at(unix_now()).await
    }

    /// Run one tick as if the current time were `now` (Unix seconds).
    #[tracing::instrument(skip(self), fields(channel = %self.channel.name()))]
    pub async fn run_at(&self, now: f64) -> CycleOutcome {
        let last_run = match self.marker.read().await {
            Ok(last_run) => last_run,
            Err(error) => {
                return CycleOutcome::Failed {
                    reason: error.to_string(),
                };
            }
        };

        let elapsed_secs = now - last_run;
        if elapsed_secs < self.min_interval_secs as f64 {
            return CycleOutcome::Skipped { elapsed_secs };
        }

        // Written before any work so a crash mid-cycle does not re-run on the next tick.
        if let Err(error) = self.marker.write(now).await {
            return CycleOutcome::Failed {
                reason: error.to_string(),
            };
        }

        match self.execute().await {
            Ok(report) => CycleOutcome::Completed {
                transcript_lines: report.transcript_lines,
                reply_chars: report.reply_chars,
                truncated: report.truncated,
            },
            Err(error) => CycleOutcome::Failed {
                reason: error.to_string(),
            },
        }
    }

    async fn execute(&self) -> Result<CycleReport> {
        let history = self.channel.fetch_recent(HISTORY_LIMIT).await?;
        let transcript = build_transcript(&history, self.bot_id);
        let transcript_lines = if transcript.is_empty() {
            0
        } else {
            transcript.lines().count()
        };
        tracing::debug!(
            fetched = history.len(),
            transcript_lines,
            "transcript assembled"
        );

        let prompt = build_prompt(&self.persona, &transcript);
        let messages = vec![ChatMessage::system(prompt.system), ChatMessage::user(prompt.user)];

        // Inference can take minutes on CPU; keep it on its own task.
        let model = self.model.clone();
        let generated = tokio::spawn(async move { model.chat(messages).await })
            .await
            .map_err(|error| LlmError::TaskAborted(error.to_string()))??;

        let (reply, truncated) = truncate_chars(&generated, MAX_REPLY_CHARS);
        if reply.trim().is_empty() {
            return Err(LlmError::InvalidResponse("model returned an empty reply".into()).into());
        }

        self.channel.send_silent(reply).await?;

        Ok(CycleReport {
            transcript_lines,
            reply_chars: reply.chars().count(),
            truncated,
        })
    }
}

/// Cut `text` to at most `max_chars` characters, never splitting one.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _character)) => (&text[..byte_index], true),
        None => (text, false),
    }
}
