//! Learning state machine types.
//!
//! Valid transitions:
//! - any -> Idle (accept, reject, expire, reset)
//! - Idle | Observing | AwaitingConfirmation | AwaitingCorrection -> Observing
//! - any -> AwaitingConfirmation
//! - Observing | AwaitingConfirmation -> AwaitingCorrection

use std::fmt;

use parley_core::types::{ResolutionTier, Timestamp};

use crate::error::LearningError;

/// An executed action waiting out the implicit-positive window.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedAction {
    /// The normalized utterance.
    pub phrase: String,
    /// Dictionary phrase that produced the action, for tiers 1 and 2.
    pub matched_phrase: Option<String>,
    pub action: String,
    pub target: Option<String>,
    pub confidence: f32,
    pub tier: ResolutionTier,
    pub timestamp: Timestamp,
}

impl ObservedAction {
    /// The dictionary phrase feedback is applied to.
    pub fn feedback_phrase(&self) -> &str {
        self.matched_phrase.as_deref().unwrap_or(&self.phrase)
    }
}

/// A suggestion the user has been asked to confirm.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    pub phrase: String,
    /// Dictionary phrase the suggestion came from, if any.
    pub matched_phrase: Option<String>,
    pub suggested_action: String,
    pub target: Option<String>,
    pub confidence: f32,
    pub description: String,
    pub tier: Option<ResolutionTier>,
    pub timestamp: Timestamp,
}

impl PendingConfirmation {
    /// The dictionary phrase a rejection is applied to.
    pub fn feedback_phrase(&self) -> &str {
        self.matched_phrase.as_deref().unwrap_or(&self.phrase)
    }
}

/// A rejected action waiting for the user to say what they meant.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionContext {
    pub phrase: String,
    pub action: String,
    /// Confidence after the rejection was applied.
    pub confidence: f32,
    pub tier: Option<ResolutionTier>,
    pub timestamp: Timestamp,
}

/// Current state, carrying the context record that state needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LearningState {
    #[default]
    Idle,
    Observing(ObservedAction),
    AwaitingConfirmation(PendingConfirmation),
    AwaitingCorrection(CorrectionContext),
}

impl LearningState {
    pub fn phase(&self) -> LearningPhase {
        match self {
            LearningState::Idle => LearningPhase::Idle,
            LearningState::Observing(_) => LearningPhase::Observing,
            LearningState::AwaitingConfirmation(_) => LearningPhase::AwaitingConfirmation,
            LearningState::AwaitingCorrection(_) => LearningPhase::AwaitingCorrection,
        }
    }
}

/// State without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LearningPhase {
    Idle,
    Observing,
    AwaitingConfirmation,
    AwaitingCorrection,
}

impl fmt::Display for LearningPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningPhase::Idle => write!(f, "IDLE"),
            LearningPhase::Observing => write!(f, "OBSERVING"),
            LearningPhase::AwaitingConfirmation => write!(f, "AWAITING_CONFIRMATION"),
            LearningPhase::AwaitingCorrection => write!(f, "AWAITING_CORRECTION"),
        }
    }
}

impl LearningPhase {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &LearningPhase) -> bool {
        use LearningPhase::*;
        matches!(
            (self, target),
            (_, Idle)
                | (_, Observing)
                | (_, AwaitingConfirmation)
                | (Observing, AwaitingCorrection)
                | (AwaitingConfirmation, AwaitingCorrection)
        )
    }

    pub fn check_transition(&self, target: LearningPhase) -> Result<(), LearningError> {
        if self.can_transition_to(&target) {
            Ok(())
        } else {
            Err(LearningError::InvalidTransition(*self, target))
        }
    }
}
