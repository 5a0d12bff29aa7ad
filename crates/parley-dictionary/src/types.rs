//! Persisted dictionary records.

use std::collections::BTreeSet;

use parley_core::types::{clamp_confidence, CommandSource, ResolutionTier, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Current on-disk document version.
pub const DOCUMENT_VERSION: u32 = 1;

/// A phrase set mapped to one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEntry {
    pub id: Uuid,
    /// Canonical phrase plus learned or generated variations. Normalized,
    /// and unique across the whole dictionary.
    pub phrases: BTreeSet<String>,
    /// Opaque action identifier understood by the execution collaborator.
    pub action: String,
    /// Free-form parameter for actions that need one (e.g. an app name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f32,
    pub source: CommandSource,
    /// Created from the bundled seed set. Survives a later confirmation,
    /// so shipped commands stay protected from removal.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub seeded: bool,
    #[serde(default)]
    pub use_count: u64,
    #[serde(default)]
    pub last_used: Option<Timestamp>,
    pub created_at: Timestamp,
    /// Fields written by newer versions, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommandEntry {
    pub fn new(
        phrases: BTreeSet<String>,
        action: String,
        target: Option<String>,
        confidence: f32,
        source: CommandSource,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            phrases,
            action,
            target,
            confidence: clamp_confidence(confidence),
            source,
            seeded: false,
            use_count: 0,
            last_used: None,
            created_at: Timestamp::now(),
            extra: Map::new(),
        }
    }

    /// Add `delta` to the confidence, clamped. Returns the new value.
    pub fn adjust_confidence(&mut self, delta: f32) -> f32 {
        self.confidence = clamp_confidence(self.confidence + delta);
        self.confidence
    }

    /// Record an accepted use.
    pub fn touch(&mut self, now: Timestamp) {
        self.use_count = self.use_count.saturating_add(1);
        self.last_used = Some(now);
    }

    /// The timestamp staleness is measured from: last use, else creation.
    pub fn last_activity(&self) -> Timestamp {
        self.last_used.unwrap_or(self.created_at)
    }

    /// True for shipped entries, including ones the user has confirmed.
    pub fn is_default(&self) -> bool {
        self.seeded || self.source == CommandSource::Default
    }
}

/// Aggregate counters persisted beside the entries. Diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryStats {
    pub tier1_hits: u64,
    pub tier2_hits: u64,
    pub tier3_hits: u64,
    pub errors: u64,
    pub dictations: u64,
    pub learned: u64,
    pub forgotten: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DictionaryStats {
    pub fn record_tier(&mut self, tier: ResolutionTier) {
        match tier {
            ResolutionTier::Exact => self.tier1_hits += 1,
            ResolutionTier::Fuzzy => self.tier2_hits += 1,
            ResolutionTier::External => self.tier3_hits += 1,
        }
    }
}

/// The whole persisted store, read and written as one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub entries: Vec<CommandEntry>,
    #[serde(default)]
    pub stats: DictionaryStats,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

impl Default for DictionaryDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            entries: Vec::new(),
            stats: DictionaryStats::default(),
            extra: Map::new(),
        }
    }
}

/// How a dictionary lookup matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The normalized query is an indexed phrase.
    Exact,
    /// A phonetic variant of the query is an indexed phrase.
    Phonetic,
    /// An indexed phrase is within the edit-distance threshold.
    EditDistance,
}

/// Result of [`CommandDictionary::lookup`](crate::CommandDictionary::lookup).
#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryMatch {
    pub entry_id: Uuid,
    pub action: String,
    pub target: Option<String>,
    pub confidence: f32,
    pub source: CommandSource,
    /// The indexed phrase that matched.
    pub phrase: String,
    pub kind: MatchKind,
    pub similarity: f32,
}

impl DictionaryMatch {
    pub fn tier(&self) -> ResolutionTier {
        match self.kind {
            MatchKind::Exact => ResolutionTier::Exact,
            MatchKind::Phonetic | MatchKind::EditDistance => ResolutionTier::Fuzzy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(confidence: f32) -> CommandEntry {
        CommandEntry::new(
            BTreeSet::from(["save file".to_string()]),
            "SAVE_FILE".to_string(),
            None,
            confidence,
            CommandSource::Learned,
        )
    }

    #[test]
    fn test_new_entry_clamps_confidence() {
        assert_eq!(entry(3.0).confidence, 1.0);
        assert_eq!(entry(-1.0).confidence, 0.0);
    }

    #[test]
    fn test_adjust_confidence_stays_in_bounds() {
        let mut e = entry(0.95);
        assert_eq!(e.adjust_confidence(0.2), 1.0);
        assert_eq!(e.adjust_confidence(-5.0), 0.0);
        let v = e.adjust_confidence(0.3);
        assert!((v - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_touch_increments_use_count() {
        let mut e = entry(0.8);
        let now = Timestamp(1_700_000_000);
        e.touch(now);
        e.touch(now);
        assert_eq!(e.use_count, 2);
        assert_eq!(e.last_used, Some(now));
        assert_eq!(e.last_activity(), now);
    }

    #[test]
    fn test_confirmed_seed_entry_is_still_default() {
        let mut e = entry(0.9);
        assert!(!e.is_default());
        e.seeded = true;
        e.source = CommandSource::Confirmed;
        assert!(e.is_default());

        let written = serde_json::to_value(&e).unwrap();
        assert_eq!(written["seeded"], true);
        let learned = serde_json::to_value(entry(0.9)).unwrap();
        assert!(learned.get("seeded").is_none());
    }

    #[test]
    fn test_last_activity_falls_back_to_created_at() {
        let e = entry(0.8);
        assert_eq!(e.last_activity(), e.created_at);
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let json = r#"{
            "version": 1,
            "entries": [{
                "id": "550e8400-e29b-41d4-a716-446655440000",
                "phrases": ["close tab"],
                "action": "CLOSE_TAB",
                "confidence": 0.9,
                "source": "default",
                "use_count": 3,
                "last_used": null,
                "created_at": 1700000000,
                "hotkey_hint": "ctrl+w"
            }],
            "stats": {"tier1_hits": 4, "avg_latency_ms": 12},
            "schema_owner": "future-version"
        }"#;

        let doc: DictionaryDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.entries[0].extra["hotkey_hint"], "ctrl+w");
        assert_eq!(doc.stats.extra["avg_latency_ms"], 12);
        assert_eq!(doc.extra["schema_owner"], "future-version");

        let written = serde_json::to_value(&doc).unwrap();
        assert_eq!(written["schema_owner"], "future-version");
        assert_eq!(written["entries"][0]["hotkey_hint"], "ctrl+w");
        assert_eq!(written["stats"]["avg_latency_ms"], 12);
    }

    #[test]
    fn test_stats_record_tier() {
        let mut stats = DictionaryStats::default();
        stats.record_tier(ResolutionTier::Exact);
        stats.record_tier(ResolutionTier::Fuzzy);
        stats.record_tier(ResolutionTier::Fuzzy);
        stats.record_tier(ResolutionTier::External);
        assert_eq!((stats.tier1_hits, stats.tier2_hits, stats.tier3_hits), (1, 2, 1));
    }

    #[test]
    fn test_match_tier_mapping() {
        let m = DictionaryMatch {
            entry_id: Uuid::new_v4(),
            action: "UNDO".to_string(),
            target: None,
            confidence: 0.9,
            source: CommandSource::Default,
            phrase: "undo".to_string(),
            kind: MatchKind::Phonetic,
            similarity: 1.0,
        };
        assert_eq!(m.tier(), ResolutionTier::Fuzzy);
    }
}
