//! Token budgets
//!
//! The completion window is budgeted in approximate tokens (4 chars ≈ 1
//! token). Trimming backs up to a sentence boundary when one exists in the
//! second half of the cut, otherwise to whitespace — never mid-word.

/// Rough token estimate used everywhere a budget is enforced
pub fn approx_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Trim to a token budget; see `trim_to_chars`
pub fn trim_to_tokens(text: &str, max_tokens: usize) -> String {
    trim_to_chars(text, max_tokens.saturating_mul(4))
}

/// Trim to a character budget at the last sentence boundary before the limit,
/// falling back to the last whitespace
pub fn trim_to_chars(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }
    let head = &chars[..max_chars];

    let sentence_end = head
        .iter()
        .rposition(|c| matches!(c, '.' | '!' | '?' | '\n'));
    if let Some(pos) = sentence_end {
        // Only honor a boundary in the second half, a tiny fragment is worse
        // than a clean word cut
        if pos >= max_chars / 2 {
            return head[..=pos].iter().collect::<String>().trim_end().to_string();
        }
    }

    let word_end = head.iter().rposition(|c| c.is_whitespace());
    let cut = word_end.unwrap_or(max_chars);
    head[..cut].iter().collect::<String>().trim_end().to_string()
}
