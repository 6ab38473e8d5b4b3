//! Prompt assembly for next-message prediction.

/// The two-message conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessages {
    pub system: String,
    pub user: String,
}

/// Build the system instruction and the user message carrying the transcript.
pub fn build_prompt(persona: &str, transcript: &str) -> PromptMessages {
    PromptMessages {
        system: format!(
            "Predict the next message by {persona} in this Discord chat. \
             Output ONLY the predicted message in the format \"Username: Message\"."
        ),
        user: format!("Here is the transcript:\n{transcript}\n\nNext message:"),
    }
}
