pub mod config;
pub mod error;
pub mod text;
pub mod types;

pub use config::ParleyConfig;
pub use error::{ParleyError, Result};
pub use text::normalize_utterance;
pub use types::*;
