//! Channel history to plain-text transcript.

use crate::{HistoryMessage, UserId};

/// Render one message as `[HH:MM] author: content`, using UTC wall time.
pub fn format_entry(message: &HistoryMessage) -> String {
    format!(
        "[{}] {}: {}",
        message.created_at.format("%H:%M"),
        message.author_name,
        message.content
    )
}

/// Build a chronological transcript from history fetched newest-first.
///
/// Messages written by `bot_id` are dropped so the model never sees its own
/// earlier predictions as chat.
pub fn build_transcript(newest_first: &[HistoryMessage], bot_id: UserId) -> String {
    let mut lines: Vec<String> = newest_first
        .iter()
        .filter(|message| message.author_id != bot_id)
        .map(format_entry)
        .collect();
    lines.reverse();
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    const BOT: UserId = 999;

    fn message(
        author_id: UserId,
        author: &str,
        content: &str,
        hour: u32,
        minute: u32,
    ) -> HistoryMessage {
        HistoryMessage {
            author_id,
            author_name: author.to_string(),
            content: content.to_string(),
            created_at: chrono::Utc
                .with_ymd_and_hms(2024, 3, 9, hour, minute, 17)
                .single()
                .expect("valid timestamp"),
        }
    }

    #[test]
    fn entry_uses_zero_padded_hours_and_minutes() {
        let entry = format_entry(&message(1, "alice", "good morning", 7, 5));
        assert_eq!(entry, "[07:05] alice: good morning");
    }

    #[test]
    fn transcript_is_oldest_first() {
        let newest_first = vec![
            message(2, "bob", "third", 12, 30),
            message(1, "alice", "second", 12, 20),
            message(2, "bob", "first", 12, 10),
        ];

        let transcript = build_transcript(&newest_first, BOT);

        assert_eq!(
            transcript,
            "[12:10] bob: first\n[12:20] alice: second\n[12:30] bob: third"
        );
    }

    #[test]
    fn transcript_skips_the_bot_itself() {
        let newest_first = vec![
            message(BOT, "mimicbot", "atreusion: predicted", 13, 0),
            message(1, "alice", "real message", 12, 59),
            message(BOT, "mimicbot", "atreusion: older prediction", 12, 0),
        ];

        let transcript = build_transcript(&newest_first, BOT);

        assert_eq!(transcript, "[12:59] alice: real message");
        assert!(!transcript.contains("prediction"));
    }

    #[test]
    fn empty_history_gives_empty_transcript() {
        assert_eq!(build_transcript(&[], BOT), "");
    }

    #[test]
    fn multiline_content_is_kept_verbatim() {
        let newest_first = vec![message(1, "alice", "line one\nline two", 9, 0)];
        assert_eq!(
            build_transcript(&newest_first, BOT),
            "[09:00] alice: line one\nline two"
        );
    }
}
