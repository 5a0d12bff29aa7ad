//! Error types for the learning loop.

use parley_core::error::ParleyError;
use parley_dictionary::DictionaryError;

use crate::state::LearningPhase;

#[derive(Debug, thiserror::Error)]
pub enum LearningError {
    #[error("Dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),
    #[error("Invalid learning transition: {0} -> {1}")]
    InvalidTransition(LearningPhase, LearningPhase),
}

impl From<LearningError> for ParleyError {
    fn from(err: LearningError) -> Self {
        ParleyError::Learning(err.to_string())
    }
}
