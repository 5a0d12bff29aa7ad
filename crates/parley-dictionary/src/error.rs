//! Error types for the command dictionary.

use parley_core::error::ParleyError;

/// Errors from reading or writing the dictionary document.
///
/// None of these reach the transcription path: `load` recovers from them
/// and `save` failures are logged by the caller.
#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("Dictionary I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Dictionary document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to replace dictionary file: {0}")]
    Persist(String),
}

impl From<DictionaryError> for ParleyError {
    fn from(err: DictionaryError) -> Self {
        ParleyError::Dictionary(err.to_string())
    }
}
