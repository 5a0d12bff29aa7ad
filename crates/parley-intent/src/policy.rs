//! What the caller does with a resolution, by confidence band.

use std::fmt;

use parley_core::config::ResolverConfig;

use crate::classifier::is_no_action;
use crate::resolver::ResolutionResult;

/// Outcome of applying the confidence policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Run the action now.
    Execute,
    /// Ask the user before running it.
    Confirm,
    /// Type the utterance as text.
    Dictate,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::Execute => write!(f, "execute"),
            Disposition::Confirm => write!(f, "confirm"),
            Disposition::Dictate => write!(f, "dictate"),
        }
    }
}

/// `>= execute_threshold` executes, `[confirm_threshold, execute_threshold)`
/// asks for confirmation, anything lower dictates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    pub execute_threshold: f32,
    pub confirm_threshold: f32,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl ConfidencePolicy {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            execute_threshold: config.execute_threshold,
            confirm_threshold: config.confirm_threshold,
        }
    }

    pub fn decide(&self, action: &str, confidence: f32) -> Disposition {
        if is_no_action(action) || confidence.is_nan() {
            Disposition::Dictate
        } else if confidence >= self.execute_threshold {
            Disposition::Execute
        } else if confidence >= self.confirm_threshold {
            Disposition::Confirm
        } else {
            Disposition::Dictate
        }
    }

    /// Disposition for an optional resolution; no resolution dictates.
    pub fn apply(&self, result: Option<&ResolutionResult>) -> Disposition {
        result.map_or(Disposition::Dictate, |r| self.decide(&r.action, r.confidence))
    }
}
