//! Per-utterance processing: feedback first, then tiered resolution and
//! the confidence policy.

use std::sync::Arc;

use parley_dictionary::CommandDictionary;
use parley_intent::{ConfidencePolicy, Disposition, IntentResolver, ResolutionResult};
use parley_learning::{FeedbackEffects, LearningLoop};

/// What happened to one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Empty after normalization.
    Ignored,
    /// Taken by the learning loop as feedback on an earlier action.
    Feedback,
    /// Resolved and run.
    Executed(ResolutionResult),
    /// Resolved with middling confidence; the user was asked.
    Confirming(ResolutionResult),
    /// Ordinary speech to be typed.
    Dictation(String),
}

pub struct CommandPipeline {
    resolver: IntentResolver,
    policy: ConfidencePolicy,
    learning: LearningLoop,
    effects: Arc<dyn FeedbackEffects>,
}

impl CommandPipeline {
    pub fn new(
        resolver: IntentResolver,
        learning: LearningLoop,
        effects: Arc<dyn FeedbackEffects>,
    ) -> Self {
        let policy = ConfidencePolicy::from_config(resolver.config());
        Self {
            resolver,
            policy,
            learning,
            effects,
        }
    }

    pub fn dictionary(&self) -> &Arc<CommandDictionary> {
        self.resolver.dictionary()
    }

    pub fn learning(&self) -> &LearningLoop {
        &self.learning
    }

    /// Process one utterance. `context` names the foreground application.
    pub async fn process(&self, utterance: &str, context: Option<&str>) -> PipelineOutcome {
        if utterance.trim().is_empty() {
            return PipelineOutcome::Ignored;
        }

        if self.learning.handle_utterance(utterance).is_consumed() {
            return PipelineOutcome::Feedback;
        }

        let result = self.resolver.resolve(utterance, context).await;
        let disposition = self.policy.apply(result.as_ref());
        tracing::debug!(disposition = %disposition, "Utterance resolved");

        match (disposition, result) {
            (Disposition::Execute, Some(result)) => {
                self.effects
                    .execute(&result.action, result.target.as_deref());
                self.learning.observe(&result);
                PipelineOutcome::Executed(result)
            }
            (Disposition::Confirm, Some(result)) => {
                self.learning.confirm(&result);
                PipelineOutcome::Confirming(result)
            }
            _ => {
                self.dictionary().record_dictation();
                PipelineOutcome::Dictation(utterance.trim().to_string())
            }
        }
    }
}
