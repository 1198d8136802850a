//! Profile facts
//!
//! A "remember" statement is parsed into a tagged variant instead of boolean
//! flags: either a fact payload was detected or nothing was. Detected payloads
//! pass a sensitive-data filter before anything persists — a match means the
//! text is discarded silently, never stored and never echoed back.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Outcome of scanning one user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactScan {
    Detected { payload: String },
    NoFact,
}

/// One durable user-scoped fact
#[derive(Debug, Clone)]
pub struct ProfileFact {
    pub user_id: String,
    pub category: &'static str,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn remember_regexes() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // Italian
            r"(?i)\bricorda\s+che\s+(.+)",
            r"(?i)\bda\s+ora\s+in\s+poi\s+ricord[ao]ti\s+che\s+(.+)",
            r"(?i)\bricord[ao]ti\s+(?:di\s+|che\s+)?(.+)",
            r"(?i)\bmemorizza\s+(?:che\s+)?(.+)",
            // English
            r"(?i)\bremember\s+that\s+(.+)",
            r"(?i)\bfrom\s+now\s+on,?\s+(?:remember|assume)\s+that\s+(.+)",
            r"(?i)\bkeep\s+in\s+mind\s+that\s+(.+)",
            r"(?i)\bplease\s+remember\s+(.+)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

fn sensitive_regexes() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // Long opaque tokens (API keys and friends)
            r"\b[A-Za-z0-9]{20,}\b",
            // key: value / key = value secrets
            r"(?i)\b(?:password|pwd|passwd|token|secret|api[_-]?key)\s*[:=]\s*\S+",
            // Card-shaped digit runs
            r"\b\d{13,19}\b",
            // Prefixed keys (sk_test_…, pk_live_…)
            r"(?i)\b(?:sk|pk)[-_][a-zA-Z0-9_]{10,}\b",
            // JWT shape
            r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// Extract the fact payload from a "remember that …" statement, if any
pub fn scan_for_fact(text: &str) -> FactScan {
    for re in remember_regexes() {
        if let Some(caps) = re.captures(text) {
            let payload = caps[1].trim().trim_end_matches(['.', '!']).to_string();
            if !payload.is_empty() {
                return FactScan::Detected { payload };
            }
        }
    }
    FactScan::NoFact
}

pub fn contains_sensitive_data(text: &str) -> bool {
    sensitive_regexes().iter().any(|re| re.is_match(text))
}

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "bio",
        &[
            "età", "anni", "anno di nascita", "nato", "città", "abito", "vivo", "lingua",
            "age", "years old", "born", "city", "live", "language",
        ],
    ),
    (
        "goal",
        &[
            "obiettivo", "voglio", "devo", "target", "goal", "aim", "want to", "need to",
            "should",
        ],
    ),
    (
        "preference",
        &[
            "preferisco", "piace", "tono", "stile", "prefer", "like", "tone", "style",
        ],
    ),
    (
        "project",
        &[
            "progetto", "lavoro", "sto lavorando", "sto facendo", "sto costruendo",
            "project", "working on", "building",
        ],
    ),
];

/// Keyword-score the payload into a category; no hit falls back to misc
pub fn classify_category(fact_text: &str) -> &'static str {
    let lower = fact_text.to_lowercase();
    let mut best: Option<(&'static str, usize)> = None;
    for (category, keywords) in CATEGORY_KEYWORDS {
        let score = keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if score > 0 && best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((category, score));
        }
    }
    best.map(|(c, _)| c).unwrap_or("misc")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_italian_and_english_triggers() {
        assert_eq!(
            scan_for_fact("Ricorda che preferisco risposte brevi"),
            FactScan::Detected {
                payload: "preferisco risposte brevi".to_string()
            }
        );
        assert_eq!(
            scan_for_fact("Please remember I live in Rome"),
            FactScan::Detected {
                payload: "I live in Rome".to_string()
            }
        );
        assert_eq!(scan_for_fact("Che tempo fa a Roma?"), FactScan::NoFact);
    }

    #[test]
    fn blocks_api_keys_and_cards() {
        assert!(contains_sensitive_data(
            "my API key is sk_test_abc123xyz789"
        ));
        assert!(contains_sensitive_data("la mia carta è 4111111111111111"));
        assert!(contains_sensitive_data("password: hunter2"));
        assert!(contains_sensitive_data(
            "token eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.abc"
        ));
        assert!(!contains_sensitive_data("preferisco il caffè al mattino"));
    }

    #[test]
    fn classifies_categories_with_misc_fallback() {
        assert_eq!(classify_category("preferisco risposte brevi"), "preference");
        assert_eq!(classify_category("sto lavorando a un progetto drone"), "project");
        assert_eq!(classify_category("vivo a Milano"), "bio");
        assert_eq!(classify_category("il cielo è blu"), "misc");
    }

    #[test]
    fn sensitive_remember_statement_yields_detected_then_blocked() {
        // Scan still detects the statement; the filter is a separate gate
        let scan = scan_for_fact("Remember that my API key is sk_test_abc123xyz789");
        match scan {
            FactScan::Detected { payload } => assert!(contains_sensitive_data(&payload)),
            FactScan::NoFact => panic!("trigger not detected"),
        }
    }
}
