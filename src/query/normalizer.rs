//! Query normalization
//!
//! Pure pre-processing before classification: strips control characters,
//! collapses whitespace, produces a lower-cased match form without terminal
//! punctuation, guesses IT/EN from stopword frequency and flags multi-question
//! input. The original text survives in `clean_text` for display.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Stopword-based language hint; `None` when the signal is ambiguous
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    It,
    En,
}

/// Normalized view of one user utterance
#[derive(Debug, Clone)]
pub struct NormalizedQuery {
    /// Cleaned text with original casing and punctuation, for display/prompts
    pub clean_text: String,
    /// Lower-cased clean text
    pub lower_text: String,
    /// Lower-cased text with terminal punctuation stripped, for pattern matching
    pub match_text: String,
    pub language_hint: Option<Language>,
    pub has_multiple_questions: bool,
}

fn it_stopwords() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "il", "lo", "la", "gli", "le", "un", "uno", "una", "di", "da", "del", "della", "dei",
            "degli", "delle", "che", "non", "mi", "ti", "si", "ci", "vi", "ne", "per", "con",
            "su", "in", "sono", "è", "sei", "come", "cosa", "quando", "dove", "perché", "chi",
            "fa", "oggi", "domani",
        ]
        .into_iter()
        .collect()
    })
}

fn en_stopwords() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
            "by", "from", "is", "are", "was", "were", "be", "been", "what", "when", "where",
            "why", "how", "who", "do", "does", "you", "my",
        ]
        .into_iter()
        .collect()
    })
}

/// Normalize raw user text. Empty input yields empty fields, never an error.
pub fn normalize(raw: &str) -> NormalizedQuery {
    let mut text = String::with_capacity(raw.len());
    for c in raw.chars() {
        // Drop control and zero-width characters; newlines become plain spaces
        let is_zero_width = matches!(c, '\u{200b}'..='\u{200f}' | '\u{202a}'..='\u{202e}' | '\u{feff}');
        if is_zero_width || (c.is_control() && c != '\n' && c != '\t') {
            continue;
        }
        text.push(if c == '\n' || c == '\t' { ' ' } else { c });
    }
    let clean_text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower_text = clean_text.to_lowercase();
    let match_text = lower_text
        .trim_end_matches(['?', '!', '.', ',', ';', ':'])
        .trim()
        .to_string();

    let question_marks = clean_text.matches('?').count();
    let sentences = clean_text
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    let has_multiple_questions = question_marks > 1 || sentences > 2;

    NormalizedQuery {
        language_hint: detect_language(&lower_text),
        clean_text,
        lower_text,
        match_text,
        has_multiple_questions,
    }
}

/// Count stopword hits per language; ties and zero-signal input resolve to `None`
fn detect_language(lower: &str) -> Option<Language> {
    let mut it = 0usize;
    let mut en = 0usize;
    for word in lower.split(|c: char| !c.is_alphanumeric() && c != '\'') {
        let word = word.trim_matches('\'');
        if word.is_empty() {
            continue;
        }
        if it_stopwords().contains(word) {
            it += 1;
        }
        if en_stopwords().contains(word) {
            en += 1;
        }
    }
    if it == 0 && en == 0 {
        return None;
    }
    match it.cmp(&en) {
        std::cmp::Ordering::Greater => Some(Language::It),
        std::cmp::Ordering::Less => Some(Language::En),
        std::cmp::Ordering::Equal => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_clean_text() {
        let q = normalize("");
        assert_eq!(q.clean_text, "");
        assert_eq!(q.match_text, "");
        assert!(!q.has_multiple_questions);
        assert!(q.language_hint.is_none());
    }

    #[test]
    fn collapses_whitespace_and_strips_controls() {
        let q = normalize("  meteo \u{200b} Roma\n\n oggi? ");
        assert_eq!(q.clean_text, "meteo Roma oggi?");
        assert_eq!(q.match_text, "meteo roma oggi");
    }

    #[test]
    fn terminal_punctuation_only_stripped_for_matching() {
        let q = normalize("Quanto vale BTC?");
        assert_eq!(q.clean_text, "Quanto vale BTC?");
        assert_eq!(q.match_text, "quanto vale btc");
    }

    #[test]
    fn detects_italian_and_english() {
        assert_eq!(
            normalize("che tempo fa oggi a Roma?").language_hint,
            Some(Language::It)
        );
        assert_eq!(
            normalize("what is the weather in Rome?").language_hint,
            Some(Language::En)
        );
        assert_eq!(normalize("btc 2025").language_hint, None);
    }

    #[test]
    fn flags_multiple_questions() {
        assert!(normalize("Che ore sono? E che giorno è?").has_multiple_questions);
        assert!(!normalize("Che ore sono?").has_multiple_questions);
    }
}
