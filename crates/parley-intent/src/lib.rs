//! Parley Intent crate - tiered resolution of utterances to actions.
//!
//! Exact and fuzzy dictionary lookup answer most utterances locally. The
//! remainder, if they look like commands, go to an external classifier
//! whose answers are cached briefly. The [`ConfidencePolicy`] turns a
//! resolution into execute, confirm or dictate.

pub mod cache;
pub mod classifier;
pub mod error;
pub mod heuristic;
pub mod llm;
pub mod policy;
pub mod resolver;

pub use cache::ClassificationCache;
pub use classifier::{is_no_action, Classification, IntentClassifier, MockClassifier, MockReply};
pub use error::ClassifierError;
pub use heuristic::looks_like_command;
pub use llm::LlmClassifier;
pub use policy::{ConfidencePolicy, Disposition};
pub use resolver::{IntentResolver, ResolutionResult};
