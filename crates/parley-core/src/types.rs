//! Shared value types used across the Parley crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Timestamp
// =============================================================================

/// Unix timestamp in seconds.
///
/// Compared by value. Two Timestamps with the same inner value are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    /// Whole days elapsed between `self` and `now`. Never negative.
    pub fn days_until(&self, now: Timestamp) -> u32 {
        let elapsed = (now.0 - self.0).max(0);
        (elapsed / 86_400) as u32
    }

    pub fn age_days(&self) -> u32 {
        self.days_until(Timestamp::now())
    }
}

// =============================================================================
// Enums
// =============================================================================

/// How a command mapping entered the dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    /// Shipped with the bundled seed set.
    Default,
    /// Inferred from a high-confidence AI-tier result.
    Learned,
    /// Explicitly affirmed by the user.
    Confirmed,
}

impl CommandSource {
    /// Rank used when the same mapping is learned again from a different source.
    /// A mapping is never downgraded.
    pub fn rank(&self) -> u8 {
        match self {
            CommandSource::Learned => 0,
            CommandSource::Confirmed => 1,
            CommandSource::Default => 2,
        }
    }
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSource::Default => write!(f, "default"),
            CommandSource::Learned => write!(f, "learned"),
            CommandSource::Confirmed => write!(f, "confirmed"),
        }
    }
}

impl std::str::FromStr for CommandSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(CommandSource::Default),
            "learned" => Ok(CommandSource::Learned),
            "confirmed" => Ok(CommandSource::Confirmed),
            _ => Err(format!("Unknown command source: {}", s)),
        }
    }
}

/// Which resolution tier produced a result, in strict preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResolutionTier {
    /// Exact dictionary match.
    Exact = 1,
    /// Fuzzy or phonetic dictionary match.
    Fuzzy = 2,
    /// External AI classification.
    External = 3,
}

impl ResolutionTier {
    pub fn number(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier{}", self.number())
    }
}

/// Clamp a confidence value into `[0.0, 1.0]`. NaN collapses to `0.0`.
pub fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
