//! Error types for intent classification.

use parley_core::error::ParleyError;

/// Failures of the external classification capability.
///
/// The resolver never propagates these: each one is logged, counted in the
/// dictionary's `errors` stat and turned into "no result".
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier timed out after {0} ms")]
    Timeout(u64),
    #[error("Classifier request failed: {0}")]
    Transport(String),
    #[error("Classifier API error: {0}")]
    Api(String),
    #[error("Malformed classifier response: {0}")]
    Malformed(String),
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClassifierError::Malformed(err.to_string())
        } else {
            ClassifierError::Transport(err.to_string())
        }
    }
}

impl From<ClassifierError> for ParleyError {
    fn from(err: ClassifierError) -> Self {
        ParleyError::Classification(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_error_display() {
        assert_eq!(
            ClassifierError::Timeout(3000).to_string(),
            "Classifier timed out after 3000 ms"
        );
        assert_eq!(
            ClassifierError::Malformed("no JSON".to_string()).to_string(),
            "Malformed classifier response: no JSON"
        );
        assert_eq!(
            ClassifierError::Unavailable("PARLEY_LLM_API_KEY not set".to_string()).to_string(),
            "Classifier unavailable: PARLEY_LLM_API_KEY not set"
        );
    }

    #[test]
    fn test_into_parley_error() {
        let err: ParleyError = ClassifierError::Api("429 rate limited".to_string()).into();
        assert!(matches!(err, ParleyError::Classification(_)));
        assert!(err.to_string().contains("429"));
    }
}
