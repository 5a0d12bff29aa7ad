//! Feedback grammar.
//!
//! A fixed table of patterns over normalized utterances. Each rule names the
//! signal it produces; rules that capture a group extract the phrase the
//! user meant. New phrasings are new rows, not new control flow.

use parley_core::text::normalize_utterance;
use regex::Regex;

/// What a feedback utterance means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackSignal {
    /// Reverse the last action.
    Undo,
    /// The last action or suggestion was wrong. Carries the intended
    /// phrase when the utterance named it ("no, I meant save file").
    Negative(Option<String>),
    /// Yes to a pending suggestion.
    Affirmative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalKind {
    Undo,
    Negative,
    Affirmative,
}

struct GrammarRule {
    regex: Regex,
    kind: SignalKind,
}

/// Compiled feedback grammar, built once and reused.
pub struct FeedbackGrammar {
    rules: Vec<GrammarRule>,
}

impl Default for FeedbackGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackGrammar {
    pub fn new() -> Self {
        let mut rules = Vec::new();

        // =====================================================================
        // Immediate undo
        // =====================================================================
        let undo_patterns: Vec<&str> = vec![
            r"^(?:hey )?(?:computer )?undo(?: that| it)?$",
            r"^(?:computer )?(?:take that back|scratch that|revert that)$",
        ];
        for pat in &undo_patterns {
            rules.push(GrammarRule {
                regex: Regex::new(pat).expect("Invalid undo regex"),
                kind: SignalKind::Undo,
            });
        }

        // =====================================================================
        // Corrections (capture group 1 is the intended phrase)
        // =====================================================================
        let correction_patterns: Vec<&str> = vec![
            r"^(?:no |nope )?i meant (.+)$",
            r"^(?:no |nope )?i mean (.+)$",
            r"^(?:no |wrong |nope )?i wanted (?:to )?(.+)$",
            r"^wrong i meant (.+)$",
            r"^not that (.+)$",
            r"^no i said (.+)$",
            r"^i said (.+)$",
            r"^actually (.+)$",
        ];
        for pat in &correction_patterns {
            rules.push(GrammarRule {
                regex: Regex::new(pat).expect("Invalid correction regex"),
                kind: SignalKind::Negative,
            });
        }

        // =====================================================================
        // Bare negatives
        // =====================================================================
        let negative_patterns: Vec<&str> = vec![
            r"^(?:no|nope|nah|no no|wrong|incorrect|not that|that's wrong|that's not right|that's not it)$",
            r"^(?:no )?(?:cancel|never mind|don't)$",
        ];
        for pat in &negative_patterns {
            rules.push(GrammarRule {
                regex: Regex::new(pat).expect("Invalid negative regex"),
                kind: SignalKind::Negative,
            });
        }

        // =====================================================================
        // Affirmatives
        // =====================================================================
        let affirmative_patterns: Vec<&str> = vec![
            r"^(?:yes|yeah|yep|yup|yes please|correct|right|sure|ok|okay|affirmative|exactly)$",
            r"^(?:do it|go ahead|that's right|that's it|yes do it)$",
        ];
        for pat in &affirmative_patterns {
            rules.push(GrammarRule {
                regex: Regex::new(pat).expect("Invalid affirmative regex"),
                kind: SignalKind::Affirmative,
            });
        }

        Self { rules }
    }

    /// Classify `utterance`, or `None` if it is not feedback.
    pub fn classify(&self, utterance: &str) -> Option<FeedbackSignal> {
        let text = normalize_utterance(utterance);
        if text.is_empty() {
            return None;
        }

        let (rule, captures) = self
            .rules
            .iter()
            .find_map(|rule| rule.regex.captures(&text).map(|caps| (rule, caps)))?;

        Some(match rule.kind {
            SignalKind::Undo => FeedbackSignal::Undo,
            SignalKind::Affirmative => FeedbackSignal::Affirmative,
            SignalKind::Negative => {
                let intended = captures
                    .get(1)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty());
                FeedbackSignal::Negative(intended)
            }
        })
    }
}
