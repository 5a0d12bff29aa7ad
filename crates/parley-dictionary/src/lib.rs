//! Parley Dictionary crate - persistent phrase-to-action mappings.
//!
//! The [`CommandDictionary`] owns every known command phrase. Lookups go
//! through an exact index first and fall back to phonetic variants and a
//! bounded edit-distance search. The whole store is one JSON document,
//! replaced atomically on save.

pub mod dictionary;
pub mod error;
pub mod fuzzy;
pub mod phonetic;
pub mod seed;
pub mod store;
pub mod types;

pub use dictionary::CommandDictionary;
pub use error::DictionaryError;
pub use fuzzy::{levenshtein, similarity, FuzzyHit, FuzzyIndex};
pub use phonetic::generate_variations;
pub use seed::{describe_action, SeedCommand, DEFAULT_COMMANDS};
pub use types::{CommandEntry, DictionaryDocument, DictionaryMatch, DictionaryStats, MatchKind};
