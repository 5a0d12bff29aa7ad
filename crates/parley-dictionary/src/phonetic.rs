//! Phonetic variation generator.
//!
//! Expands a phrase into the set of variants a speech recognizer plausibly
//! produces when it mishears it. The generator is pure: the same phrase
//! always yields the same set, and the set always contains the phrase itself.

use std::collections::BTreeSet;

/// Whole-word confusions. Applied in both directions.
const WORD_CONFUSIONS: &[(&str, &str)] = &[
    ("power", "hour"),
    ("tab", "tap"),
    ("tab", "tub"),
    ("new", "knew"),
    ("line", "lime"),
    ("line", "lane"),
    ("close", "clothes"),
    ("save", "safe"),
    ("file", "fire"),
    ("undo", "undue"),
    ("copy", "coffee"),
    ("paste", "based"),
    ("select", "collect"),
    ("all", "awl"),
    ("word", "world"),
    ("next", "necks"),
    ("window", "widow"),
    ("scroll", "school"),
    ("down", "dawn"),
    ("right", "write"),
    ("stop", "top"),
    ("mute", "moot"),
    ("enter", "inter"),
    ("to", "two"),
    ("to", "too"),
    ("for", "four"),
    ("comma", "karma"),
    ("space", "pace"),
    ("back", "bag"),
];

/// Sub-word fragments that recognizers swap for one another. Directional:
/// `(fragment, replacement)`.
const FRAGMENT_CONFUSIONS: &[(&str, &str)] = &[
    ("ph", "f"),
    ("f", "ph"),
    ("ck", "k"),
    ("ee", "ea"),
    ("ea", "ee"),
    ("ai", "ay"),
    ("ay", "ai"),
    ("th", "d"),
    ("oo", "u"),
    ("ou", "ow"),
    ("v", "b"),
    ("tion", "shun"),
];

/// Generate every recognizer-error variant of `phrase`, including `phrase`.
///
/// Variants come from three rules:
/// 1. one word swapped for a known whole-word confusion;
/// 2. one word with its first occurrence of a confusable fragment replaced;
/// 3. for two-word phrases, the words joined directly and with a hyphen.
///
/// Substitutions are applied one at a time, so the set grows linearly with
/// phrase length rather than combinatorially.
pub fn generate_variations(phrase: &str) -> BTreeSet<String> {
    let mut variants = BTreeSet::new();
    variants.insert(phrase.to_string());

    let words: Vec<&str> = phrase.split_whitespace().collect();
    if words.is_empty() {
        return variants;
    }

    for (i, word) in words.iter().enumerate() {
        for substitute in word_substitutes(word) {
            variants.insert(replace_word(&words, i, substitute));
        }

        for (fragment, replacement) in FRAGMENT_CONFUSIONS {
            if let Some(pos) = word.find(fragment) {
                let mut swapped = String::with_capacity(word.len() + replacement.len());
                swapped.push_str(&word[..pos]);
                swapped.push_str(replacement);
                swapped.push_str(&word[pos + fragment.len()..]);
                if swapped != *word {
                    variants.insert(replace_word(&words, i, &swapped));
                }
            }
        }
    }

    if words.len() == 2 {
        variants.insert(format!("{}{}", words[0], words[1]));
        variants.insert(format!("{}-{}", words[0], words[1]));
    }

    variants
}

/// Known whole-word confusions for `word`, in table order.
fn word_substitutes(word: &str) -> impl Iterator<Item = &'static str> + '_ {
    WORD_CONFUSIONS.iter().filter_map(move |(a, b)| {
        if *a == word {
            Some(*b)
        } else if *b == word {
            Some(*a)
        } else {
            None
        }
    })
}

fn replace_word(words: &[&str], index: usize, replacement: &str) -> String {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| if i == index { replacement } else { w })
        .collect::<Vec<_>>()
        .join(" ")
}
