//! Fixed-period timer that drives the generation cycle.
//!
//! The first tick fires immediately, then once per period. Each tick awaits
//! its cycle before the next tick is taken, so cycles never overlap.

use crate::cycle::{CycleOutcome, GenerationCycle};
use std::sync::Arc;
use tokio::time::Duration;

/// Handle to the running timer task.
pub struct Scheduler {
    handle: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Spawn the timer loop.
    pub fn start(cycle: Arc<GenerationCycle>, period: Duration) -> Self {
        tracing::info!(period_secs = period.as_secs(), "generation timer started");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // Skip catch-up ticks if a cycle overruns; keep the original cadence.
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let outcome = cycle.run().await;
                log_outcome(&outcome);
            }
        });

        Self { handle }
    }

    /// Stop the timer. A cycle in flight is dropped at its next await point.
    pub async fn shutdown(self) {
        self.handle.abort();
        let _ = self.handle.await;
        tracing::debug!("generation timer stopped");
    }
}

/// The single place cycle outcomes are reported.
pub fn log_outcome(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Skipped { elapsed_secs } => {
            tracing::info!(
                elapsed_secs = elapsed_secs.round() as i64,
                "skipping run; interval not reached"
            );
        }
        CycleOutcome::Completed {
            transcript_lines,
            reply_chars,
            truncated,
        } => {
            tracing::info!(
                transcript_lines,
                reply_chars,
                truncated,
                "prediction posted"
            );
        }
        CycleOutcome::Failed { reason } => {
            tracing::error!(%reason, "generation cycle failed");
        }
    }
}
