//! Edit-distance similarity and the bounded fuzzy index.
//!
//! Similarity is normalized Levenshtein over characters:
//! `1 - distance / max(len_a, len_b)`. Two empty strings are identical.

use std::collections::BTreeMap;

/// Slack for float rounding so a score sitting exactly on the threshold counts.
const SIMILARITY_EPSILON: f32 = 1e-6;

/// Calculate Levenshtein distance between two strings.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Normalized similarity in `[0.0, 1.0]`.
pub fn similarity(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f32 / longest as f32
}

/// A scored fuzzy candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyHit {
    pub phrase: String,
    pub similarity: f32,
}

/// Phrases bucketed by character length.
///
/// A phrase of length `m` can only reach similarity `s` against a query of
/// length `n` when `|m - n| <= (1 - s) * max(m, n)`, so a lookup scores
/// only the buckets inside that band instead of every phrase.
#[derive(Debug, Default, Clone)]
pub struct FuzzyIndex {
    buckets: BTreeMap<usize, Vec<String>>,
    len: usize,
}

impl FuzzyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over `phrases`.
    pub fn build<'a>(phrases: impl IntoIterator<Item = &'a str>) -> Self {
        let mut index = Self::new();
        for phrase in phrases {
            index.insert(phrase);
        }
        index
    }

    pub fn insert(&mut self, phrase: &str) {
        self.buckets
            .entry(phrase.chars().count())
            .or_default()
            .push(phrase.to_string());
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every indexed phrase whose similarity to `query` is at least
    /// `threshold`, best first. Ties are ordered lexicographically.
    pub fn search(&self, query: &str, threshold: f32) -> Vec<FuzzyHit> {
        let n = query.chars().count();
        let threshold = threshold.clamp(0.0, 1.0);

        // Widest band any candidate length may sit in: when m > n the
        // allowed gap grows with m, so bound it by solving m - n <= (1-s)m.
        let lower = ((n as f32) * threshold).floor() as usize;
        let upper = if threshold > 0.0 {
            ((n as f32) / threshold).ceil() as usize
        } else {
            usize::MAX
        };

        let mut hits: Vec<FuzzyHit> = self
            .buckets
            .range(lower..=upper)
            .flat_map(|(_, phrases)| phrases.iter())
            .filter_map(|phrase| {
                let score = similarity(query, phrase);
                (score + SIMILARITY_EPSILON >= threshold).then(|| FuzzyHit {
                    phrase: phrase.clone(),
                    similarity: score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.phrase.cmp(&b.phrase))
        });
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("hello", "helo"), 1);
        assert_eq!(levenshtein("hello", "world"), 4);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("close tab", "close tab"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_similarity_exactly_at_threshold() {
        // 3 edits over 10 characters -> 0.7.
        let score = similarity("abcdefghij", "abcdefgxyz");
        assert!((score - 0.7).abs() < 1e-6);

        let index = FuzzyIndex::build(["abcdefgxyz"]);
        let hits = index.search("abcdefghij", 0.7);
        assert_eq!(hits.len(), 1, "threshold is inclusive");
    }

    #[test]
    fn test_search_orders_best_first() {
        let index = FuzzyIndex::build(["new line", "new lime", "new tab"]);
        let hits = index.search("new lane", 0.7);
        assert_eq!(hits[0].phrase, "new line");
        assert_eq!(hits[1].phrase, "new lime");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.similarity >= 0.7));
    }

    #[test]
    fn test_search_excludes_out_of_band_lengths() {
        let index = FuzzyIndex::build(["go", "close the current browser tab"]);
        assert!(index.search("close tab", 0.7).is_empty());
    }

    #[test]
    fn test_length_band_never_hides_a_qualifying_phrase() {
        let phrases = ["save", "saved", "save it", "save file", "safe file", "save files now"];
        let index = FuzzyIndex::build(phrases);
        for query in ["save", "save fil", "save the file", "sav"] {
            let from_index: Vec<String> =
                index.search(query, 0.7).into_iter().map(|h| h.phrase).collect();
            let brute: Vec<&str> = phrases
                .iter()
                .copied()
                .filter(|p| similarity(query, p) >= 0.7)
                .collect();
            assert_eq!(from_index.len(), brute.len(), "query {query}");
        }
    }

    #[test]
    fn test_empty_index() {
        let index = FuzzyIndex::new();
        assert!(index.is_empty());
        assert!(index.search("anything", 0.7).is_empty());
    }
}
