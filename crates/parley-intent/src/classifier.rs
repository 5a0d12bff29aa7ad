//! The external classification capability consumed as tier 3.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parley_core::text::normalize_utterance;
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// Labels meaning "this is not a command".
const NO_ACTION_LABELS: &[&str] = &["none", "unknown", "dictation"];

/// True if `action` is empty or one of the no-action labels.
pub fn is_no_action(action: &str) -> bool {
    let action = action.trim();
    action.is_empty()
        || NO_ACTION_LABELS
            .iter()
            .any(|label| action.eq_ignore_ascii_case(label))
}

// =============================================================================
// Classification
// =============================================================================

/// What the classifier thinks an utterance means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub action: String,
    /// 0.0 to 1.0. Callers clamp; classifiers are not trusted to.
    pub confidence: f32,
    #[serde(default)]
    pub target: Option<String>,
}

impl Classification {
    pub fn new(action: impl Into<String>, confidence: f32) -> Self {
        Self {
            action: action.into(),
            confidence,
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// The "not a command" answer.
    pub fn none() -> Self {
        Self::new("none", 0.0)
    }

    pub fn is_no_action(&self) -> bool {
        is_no_action(&self.action)
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Maps an utterance, plus optional short context such as the foreground
/// application, to an action label with a confidence.
///
/// Implementations are expected to be slow and fallible relative to the
/// dictionary tiers.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        utterance: &str,
        context: Option<&str>,
    ) -> Result<Classification, ClassifierError>;
}

// =============================================================================
// Mock implementation
// =============================================================================

/// Scripted reply for [`MockClassifier`].
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(Classification),
    Fail(String),
    /// Sleep, then answer "none". Used to exercise timeouts.
    Stall(Duration),
}

/// Classifier answering from a fixed script and counting calls.
///
/// Utterances are matched after normalization; unscripted ones get
/// [`Classification::none`].
#[derive(Debug, Default)]
pub struct MockClassifier {
    replies: HashMap<String, MockReply>,
    calls: AtomicUsize,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, utterance: &str, reply: MockReply) -> Self {
        self.replies.insert(normalize_utterance(utterance), reply);
        self
    }

    pub fn respond(self, utterance: &str, classification: Classification) -> Self {
        self.with_reply(utterance, MockReply::Respond(classification))
    }

    /// Number of `classify` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntentClassifier for MockClassifier {
    async fn classify(
        &self,
        utterance: &str,
        _context: Option<&str>,
    ) -> Result<Classification, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.get(&normalize_utterance(utterance)) {
            Some(MockReply::Respond(c)) => Ok(c.clone()),
            Some(MockReply::Fail(msg)) => Err(ClassifierError::Api(msg.clone())),
            Some(MockReply::Stall(delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(Classification::none())
            }
            None => Ok(Classification::none()),
        }
    }
}
