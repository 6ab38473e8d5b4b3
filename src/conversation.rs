//! Transcript assembly and prompt construction.

pub mod context;
pub mod transcript;

pub use context::{build_prompt, PromptMessages};
pub use transcript::{build_transcript, format_entry};
