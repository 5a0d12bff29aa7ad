//! Utterance normalization.
//!
//! Every phrase stored in or looked up from the dictionary goes through
//! [`normalize_utterance`], which makes matching case- and
//! punctuation-insensitive.

/// Lower-case, strip punctuation and collapse whitespace.
///
/// Hyphens and apostrophes survive when they sit between two alphanumeric
/// characters ("new-line", "don't"); everywhere else they are dropped.
pub fn normalize_utterance(text: &str) -> String {
    let lowered = text.to_lowercase();
    let chars: Vec<char> = lowered.chars().collect();
    let mut cleaned = String::with_capacity(lowered.len());

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            cleaned.push(c);
        } else if c == '-' || c == '\'' || c == '\u{2019}' {
            let inner = i > 0
                && i + 1 < chars.len()
                && chars[i - 1].is_alphanumeric()
                && chars[i + 1].is_alphanumeric();
            if inner {
                cleaned.push(if c == '\u{2019}' { '\'' } else { c });
            } else {
                cleaned.push(' ');
            }
        } else {
            cleaned.push(' ');
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
