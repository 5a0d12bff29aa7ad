//! Cheap gate run before any external classification call.
//!
//! Commands are short and imperative ("open spotify", "close that window").
//! Dictation tends to be longer and to open with a pronoun, an article or a
//! greeting. Anything the gate rejects goes straight to dictation without
//! costing a network round trip.

use parley_core::text::normalize_utterance;

/// Wake prefixes stripped before inspecting the first word. Longest first.
const WAKE_PREFIXES: &[&str] = &["hey computer ", "ok computer ", "computer "];

const IMPERATIVE_VERBS: &[&str] = &[
    "add", "capitalize", "clear", "close", "copy", "create", "cut", "decrease", "delete",
    "duplicate", "exit", "find", "focus", "format", "go", "hide", "increase", "insert",
    "launch", "lock", "maximize", "minimize", "move", "mute", "new", "next", "open", "paste",
    "pause", "play", "power", "press", "previous", "print", "quit", "redo", "refresh",
    "reload", "remove", "rename", "restart", "resume", "run", "save", "scroll", "search",
    "select", "send", "set", "show", "shut", "skip", "start", "stop", "switch", "take",
    "toggle", "turn", "type", "undo", "unmute", "zoom",
];

/// Words that typically start a dictated sentence rather than a command.
const DICTATION_OPENERS: &[&str] = &[
    "a", "an", "and", "because", "but", "dear", "hello", "he", "here", "hi", "i", "i'm",
    "if", "it", "it's", "my", "our", "she", "so", "thank", "thanks", "the", "their",
    "there", "they", "this", "we", "well", "when", "you", "your",
];

/// Maximum words for a short phrase to pass without a known verb.
const SHORT_PHRASE_WORDS: usize = 3;

/// Decide whether `text` is worth sending to the external classifier.
///
/// Accepts 1..=`max_words` words where either the first word (after an
/// optional wake prefix) is a known imperative verb, or the phrase has at
/// most three words and does not open like dictation.
pub fn looks_like_command(text: &str, max_words: usize) -> bool {
    let normalized = normalize_utterance(text);
    let word_count = normalized.split_whitespace().count();
    if word_count == 0 || word_count > max_words {
        return false;
    }

    let body = strip_wake_prefix(&normalized);
    let mut words = body.split_whitespace();
    let Some(first) = words.next() else {
        return false;
    };

    if IMPERATIVE_VERBS.contains(&first) {
        return true;
    }

    let body_words = 1 + words.count();
    body_words <= SHORT_PHRASE_WORDS && !DICTATION_OPENERS.contains(&first)
}

fn strip_wake_prefix(text: &str) -> &str {
    WAKE_PREFIXES
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
        .unwrap_or(text)
}
