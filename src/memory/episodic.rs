//! Episodic memory types
//!
//! A Turn is append-only; summaries compact a cleared buffer segment. The
//! rule-based fallback summary keeps the first words of up to three user
//! messages, so a dead completion service still leaves a usable trace.

use chrono::{DateTime, Utc};

use crate::memory::budget::approx_tokens;

/// One user/assistant exchange, immutable once recorded
#[derive(Debug, Clone)]
pub struct Turn {
    pub user_text: String,
    pub assistant_text: String,
    pub timestamp: DateTime<Utc>,
    pub token_estimate: usize,
}

impl Turn {
    pub fn new(user_text: &str, assistant_text: &str) -> Self {
        let token_estimate = approx_tokens(user_text) + approx_tokens(assistant_text);
        Self {
            user_text: user_text.to_string(),
            assistant_text: assistant_text.to_string(),
            timestamp: Utc::now(),
            token_estimate,
        }
    }
}

/// Compacted record of one buffer segment
#[derive(Debug, Clone)]
pub struct EpisodicSummary {
    pub conversation_id: String,
    pub text: String,
    pub turns_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Transcript fed to the summarization prompt
pub fn build_transcript(turns: &[Turn]) -> String {
    let mut lines = Vec::with_capacity(turns.len() * 3);
    for (i, turn) in turns.iter().enumerate() {
        lines.push(format!("Turn {}:", i + 1));
        lines.push(format!("User: {}", turn.user_text));
        lines.push(format!("Assistant: {}", turn.assistant_text));
    }
    lines.join("\n")
}

/// Deterministic fallback: "Conversazione su: <head> | <head> | <head>"
pub fn fallback_summary(turns: &[Turn]) -> String {
    let topics: Vec<String> = turns
        .iter()
        .filter_map(|turn| {
            let words: Vec<&str> = turn.user_text.split_whitespace().take(8).collect();
            if words.is_empty() {
                None
            } else {
                Some(format!("{}...", words.join(" ")))
            }
        })
        .take(3)
        .collect();
    format!("Conversazione su: {}", topics.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_estimates_tokens_from_both_sides() {
        let turn = Turn::new("abcdefgh", "ijklmnop");
        assert_eq!(turn.token_estimate, 4);
    }

    #[test]
    fn fallback_summary_keeps_at_most_three_topics() {
        let turns: Vec<Turn> = (0..5)
            .map(|i| Turn::new(&format!("argomento numero {} della chat", i), "ok"))
            .collect();
        let summary = fallback_summary(&turns);
        assert!(summary.starts_with("Conversazione su: "));
        assert_eq!(summary.matches(" | ").count(), 2);
    }

    #[test]
    fn transcript_interleaves_roles() {
        let turns = vec![Turn::new("domanda", "risposta")];
        let t = build_transcript(&turns);
        assert!(t.contains("User: domanda"));
        assert!(t.contains("Assistant: risposta"));
    }
}
