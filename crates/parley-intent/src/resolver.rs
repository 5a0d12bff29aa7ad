//! Tiered intent resolution.
//!
//! Tier 1 and tier 2 are answered by the [`CommandDictionary`]. Only when
//! both miss, and the utterance passes [`looks_like_command`], does the
//! resolver spend an external classifier call (tier 3). A dictionary hit
//! always preempts tier 3.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley_core::config::ResolverConfig;
use parley_core::text::normalize_utterance;
use parley_core::types::{clamp_confidence, ResolutionTier};
use parley_dictionary::{CommandDictionary, DictionaryMatch};
use tokio::time::Instant;

use crate::cache::ClassificationCache;
use crate::classifier::{Classification, IntentClassifier};
use crate::error::ClassifierError;
use crate::heuristic::looks_like_command;

/// A single best interpretation of an utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    /// The normalized utterance that was resolved.
    pub phrase: String,
    pub action: String,
    pub confidence: f32,
    pub tier: ResolutionTier,
    pub target: Option<String>,
    pub latency: Duration,
    /// Dictionary phrase that matched, for tiers 1 and 2.
    pub matched_phrase: Option<String>,
}

impl ResolutionResult {
    fn from_match(phrase: String, m: DictionaryMatch, latency: Duration) -> Self {
        Self {
            tier: m.tier(),
            phrase,
            action: m.action,
            confidence: m.confidence,
            target: m.target,
            latency,
            matched_phrase: Some(m.phrase),
        }
    }

    fn from_classification(phrase: String, c: Classification, latency: Duration) -> Self {
        Self {
            phrase,
            action: c.action,
            confidence: clamp_confidence(c.confidence),
            tier: ResolutionTier::External,
            target: c.target,
            latency,
            matched_phrase: None,
        }
    }
}

/// Resolves utterances against the dictionary and, as a last resort, an
/// external classifier.
pub struct IntentResolver {
    dictionary: Arc<CommandDictionary>,
    classifier: Option<Arc<dyn IntentClassifier>>,
    cache: Mutex<ClassificationCache>,
    config: ResolverConfig,
}

impl IntentResolver {
    /// A resolver with tiers 1 and 2 only.
    pub fn new(dictionary: Arc<CommandDictionary>, config: ResolverConfig) -> Self {
        Self {
            dictionary,
            classifier: None,
            cache: Mutex::new(ClassificationCache::new(config.cache_ttl())),
            config,
        }
    }

    /// Enable tier 3 with `classifier`.
    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn dictionary(&self) -> &Arc<CommandDictionary> {
        &self.dictionary
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// True when tier 3 can run at all.
    pub fn tier3_available(&self) -> bool {
        self.config.ai_enabled && self.classifier.is_some()
    }

    pub fn looks_like_command(&self, text: &str) -> bool {
        looks_like_command(text, self.config.max_command_words)
    }

    /// Tier 1 and tier 2 only. Never touches the classifier.
    pub fn resolve_with_dictionary(&self, text: &str) -> Option<ResolutionResult> {
        let start = Instant::now();
        let phrase = normalize_utterance(text);
        let m = self.dictionary.lookup(&phrase)?;
        Some(ResolutionResult::from_match(phrase, m, start.elapsed()))
    }

    /// Resolve `text` to its best interpretation, or `None` for dictation.
    ///
    /// Classifier failures are logged, counted and reported as `None`; they
    /// never reach the caller.
    pub async fn resolve(&self, text: &str, context: Option<&str>) -> Option<ResolutionResult> {
        let start = Instant::now();
        let phrase = normalize_utterance(text);
        if phrase.is_empty() {
            return None;
        }

        if let Some(m) = self.dictionary.lookup(&phrase) {
            let result = ResolutionResult::from_match(phrase, m, start.elapsed());
            self.dictionary.record_tier_hit(result.tier);
            tracing::debug!(
                phrase = %result.phrase,
                action = %result.action,
                tier = %result.tier,
                "Resolved from dictionary"
            );
            return Some(result);
        }

        let classifier = match &self.classifier {
            Some(classifier) if self.config.ai_enabled => classifier,
            _ => return None,
        };
        if !self.looks_like_command(&phrase) {
            tracing::debug!(phrase = %phrase, "Skipping classifier, looks like dictation");
            return None;
        }

        if let Some(cached) = self.cached(&phrase) {
            tracing::debug!(phrase = %phrase, action = %cached.action, "Classifier cache hit");
            return self.finish_tier3(phrase, cached, start);
        }

        match self.classify(classifier.as_ref(), &phrase, context).await {
            Ok(classification) => {
                self.remember(&phrase, &classification);
                self.finish_tier3(phrase, classification, start)
            }
            Err(e) => {
                self.dictionary.record_error();
                tracing::warn!(phrase = %phrase, error = %e, "Classifier failed, treating as dictation");
                None
            }
        }
    }

    /// Number of fresh tier-3 answers held in the cache.
    pub fn cached_answers(&self) -> usize {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.purge_expired();
        cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    async fn classify(
        &self,
        classifier: &dyn IntentClassifier,
        phrase: &str,
        context: Option<&str>,
    ) -> Result<Classification, ClassifierError> {
        let timeout = self.config.classifier_timeout();
        match tokio::time::timeout(timeout, classifier.classify(phrase, context)).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(timeout.as_millis() as u64)),
        }
    }

    fn finish_tier3(
        &self,
        phrase: String,
        classification: Classification,
        start: Instant,
    ) -> Option<ResolutionResult> {
        let result = ResolutionResult::from_classification(phrase, classification, start.elapsed());
        self.dictionary.record_tier_hit(ResolutionTier::External);
        tracing::debug!(
            phrase = %result.phrase,
            action = %result.action,
            confidence = result.confidence,
            latency_ms = result.latency.as_millis() as u64,
            "Resolved by classifier"
        );
        Some(result)
    }

    fn cached(&self, phrase: &str) -> Option<Classification> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(phrase)
    }

    fn remember(&self, phrase: &str, classification: &Classification) {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(phrase.to_string(), classification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{MockClassifier, MockReply};
    use parley_core::config::DictionaryConfig;
    use parley_core::types::CommandSource;
    use parley_dictionary::DEFAULT_COMMANDS;
    use tempfile::TempDir;

    fn setup(mock: MockClassifier) -> (TempDir, Arc<MockClassifier>, IntentResolver) {
        setup_with_config(mock, ResolverConfig::default())
    }

    fn setup_with_config(
        mock: MockClassifier,
        config: ResolverConfig,
    ) -> (TempDir, Arc<MockClassifier>, IntentResolver) {
        let dir = tempfile::tempdir().unwrap();
        let dictionary = Arc::new(CommandDictionary::open(
            dir.path().join("commands.json"),
            DictionaryConfig::default(),
            DEFAULT_COMMANDS,
        ));
        let mock = Arc::new(mock);
        let resolver = IntentResolver::new(dictionary, config).with_classifier(mock.clone());
        (dir, mock, resolver)
    }

    // =====================================================================
    // Tier ordering
    // =====================================================================

    #[tokio::test]
    async fn test_tier1_never_calls_classifier() {
        // Even a classifier that would answer with certainty is not asked.
        let mock = MockClassifier::new().respond("close tab", Classification::new("OTHER", 1.0));
        let (_dir, mock, resolver) = setup(mock);

        let result = resolver.resolve("Close tab!", None).await.unwrap();
        assert_eq!(result.action, "CLOSE_TAB");
        assert_eq!(result.tier, ResolutionTier::Exact);
        assert_eq!(result.matched_phrase.as_deref(), Some("close tab"));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_tier1_preempts_regardless_of_entry_confidence() {
        let (_dir, mock, resolver) = setup(MockClassifier::new());
        resolver.dictionary().adjust_confidence("undo", -1.0);

        let result = resolver.resolve("undo", None).await.unwrap();
        assert_eq!(result.tier, ResolutionTier::Exact);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_tier2_never_calls_classifier() {
        let (_dir, mock, resolver) = setup(MockClassifier::new());

        let result = resolver.resolve("minimise window", None).await.unwrap();
        assert_eq!(result.action, "MINIMIZE_WINDOW");
        assert_eq!(result.tier, ResolutionTier::Fuzzy);
        assert_eq!(mock.calls(), 0);
        assert_eq!(resolver.dictionary().stats().tier2_hits, 1);
    }

    #[test]
    fn test_resolve_with_dictionary_is_sync_and_local() {
        let (_dir, mock, resolver) = setup(MockClassifier::new());
        assert!(resolver.resolve_with_dictionary("open spotify").is_none());
        assert_eq!(resolver.resolve_with_dictionary("new line").unwrap().action, "NEW_LINE");
        assert_eq!(mock.calls(), 0);
    }

    // =====================================================================
    // Tier 3
    // =====================================================================

    #[tokio::test]
    async fn test_tier3_classifies_command_like_miss() {
        let mock = MockClassifier::new().respond(
            "open spotify",
            Classification::new("OPEN_APP", 0.92).with_target("spotify"),
        );
        let (_dir, mock, resolver) = setup(mock);

        let result = resolver.resolve("open spotify", Some("Finder")).await.unwrap();
        assert_eq!(result.tier, ResolutionTier::External);
        assert_eq!(result.action, "OPEN_APP");
        assert_eq!(result.target.as_deref(), Some("spotify"));
        assert!(result.matched_phrase.is_none());
        assert_eq!(mock.calls(), 1);
        assert_eq!(resolver.dictionary().stats().tier3_hits, 1);
    }

    #[tokio::test]
    async fn test_dictation_skips_classifier() {
        let (_dir, mock, resolver) = setup(MockClassifier::new());
        let result = resolver
            .resolve("I think the meeting went really well today", None)
            .await;
        assert!(result.is_none());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_classifier_clamps_confidence() {
        let mock = MockClassifier::new().respond("open spotify", Classification::new("OPEN_APP", 7.5));
        let (_dir, _mock, resolver) = setup(mock);
        let result = resolver.resolve("open spotify", None).await.unwrap();
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_cache_absorbs_repeats() {
        let mock = MockClassifier::new().respond("open spotify", Classification::new("OPEN_APP", 0.9));
        let (_dir, mock, resolver) = setup(mock);

        resolver.resolve("open spotify", None).await.unwrap();
        let again = resolver.resolve("Open Spotify.", None).await.unwrap();
        assert_eq!(again.action, "OPEN_APP");
        assert_eq!(mock.calls(), 1);
        assert_eq!(resolver.cached_answers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires() {
        let mock = MockClassifier::new().respond("open spotify", Classification::new("OPEN_APP", 0.9));
        let (_dir, mock, resolver) = setup(mock);

        resolver.resolve("open spotify", None).await;
        tokio::time::advance(Duration::from_secs(301)).await;
        resolver.resolve("open spotify", None).await;
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_action_answer_is_returned_for_policy() {
        let (_dir, mock, resolver) = setup(MockClassifier::new());
        let result = resolver.resolve("bigger font", None).await.unwrap();
        assert_eq!(result.action, "none");
        assert_eq!(mock.calls(), 1);
    }

    // =====================================================================
    // Failure semantics
    // =====================================================================

    #[tokio::test]
    async fn test_classifier_error_is_swallowed_and_counted() {
        let mock = MockClassifier::new()
            .with_reply("open spotify", MockReply::Fail("HTTP 500".to_string()));
        let (_dir, mock, resolver) = setup(mock);

        assert!(resolver.resolve("open spotify", None).await.is_none());
        assert_eq!(resolver.dictionary().stats().errors, 1);

        // Failures are not cached; the next utterance is a new attempt.
        assert!(resolver.resolve("open spotify", None).await.is_none());
        assert_eq!(mock.calls(), 2);
        assert_eq!(resolver.dictionary().stats().errors, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classifier_timeout_is_swallowed() {
        let mock = MockClassifier::new()
            .with_reply("open spotify", MockReply::Stall(Duration::from_secs(60)));
        let (_dir, _mock, resolver) = setup(mock);

        assert!(resolver.resolve("open spotify", None).await.is_none());
        assert_eq!(resolver.dictionary().stats().errors, 1);
    }

    #[tokio::test]
    async fn test_ai_disabled_never_calls_classifier() {
        let config = ResolverConfig {
            ai_enabled: false,
            ..ResolverConfig::default()
        };
        let mock = MockClassifier::new().respond("open spotify", Classification::new("OPEN_APP", 0.9));
        let (_dir, mock, resolver) = setup_with_config(mock, config);

        assert!(!resolver.tier3_available());
        assert!(resolver.resolve("open spotify", None).await.is_none());
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_learned_phrase_moves_from_tier3_to_tier1() {
        let mock = MockClassifier::new().respond("open spotify", Classification::new("OPEN_APP", 0.9));
        let (_dir, mock, resolver) = setup(mock);

        resolver.resolve("open spotify", None).await.unwrap();
        resolver
            .dictionary()
            .learn("open spotify", "OPEN_APP", CommandSource::Learned, 0.9);
        resolver.clear_cache();

        let result = resolver.resolve("open spotify", None).await.unwrap();
        assert_eq!(result.tier, ResolutionTier::Exact);
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_utterance() {
        let (_dir, mock, resolver) = setup(MockClassifier::new());
        assert!(resolver.resolve("  ,, ", None).await.is_none());
        assert_eq!(mock.calls(), 0);
    }
}
