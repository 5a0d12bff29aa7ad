//! The command dictionary: single source of truth for phrase-to-action
//! mappings.
//!
//! All entries live in one [`DictionaryDocument`] behind an `RwLock`. Two
//! indexes are derived from it: an exact hash from phrase to entry, and a
//! length-bucketed fuzzy index. Every structural mutation rebuilds both
//! before the write lock is released, so a lookup never observes an index
//! that disagrees with the committed entries.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use parley_core::config::DictionaryConfig;
use parley_core::text::normalize_utterance;
use parley_core::types::{clamp_confidence, CommandSource, ResolutionTier, Timestamp};
use uuid::Uuid;

use crate::error::DictionaryError;
use crate::fuzzy::FuzzyIndex;
use crate::phonetic::generate_variations;
use crate::seed::{SeedCommand, DEFAULT_SEED_CONFIDENCE};
use crate::store;
use crate::types::{CommandEntry, DictionaryDocument, DictionaryMatch, DictionaryStats, MatchKind};

struct DictionaryInner {
    document: DictionaryDocument,
    /// Phrase -> position in `document.entries`.
    exact: HashMap<String, usize>,
    fuzzy: FuzzyIndex,
}

impl DictionaryInner {
    fn empty() -> Self {
        Self {
            document: DictionaryDocument::default(),
            exact: HashMap::new(),
            fuzzy: FuzzyIndex::new(),
        }
    }

    fn rebuild_indexes(&mut self) {
        let mut exact = HashMap::new();
        for (idx, entry) in self.document.entries.iter().enumerate() {
            for phrase in &entry.phrases {
                exact.insert(phrase.clone(), idx);
            }
        }
        self.fuzzy = FuzzyIndex::build(exact.keys().map(String::as_str));
        self.exact = exact;
        debug_assert!(is_consistent(&self.document), "dictionary invariant violated");
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.document.entries.iter().position(|e| e.id == id)
    }

    fn make_match(&self, idx: usize, phrase: &str, kind: MatchKind, similarity: f32) -> DictionaryMatch {
        let entry = &self.document.entries[idx];
        DictionaryMatch {
            entry_id: entry.id,
            action: entry.action.clone(),
            target: entry.target.clone(),
            confidence: entry.confidence,
            source: entry.source,
            phrase: phrase.to_string(),
            kind,
            similarity,
        }
    }

    /// Remove `phrase` from its owner. Returns false if nothing was removed.
    fn remove_phrase(&mut self, phrase: &str, force: bool) -> bool {
        let Some(&idx) = self.exact.get(phrase) else {
            return false;
        };
        let entry = &mut self.document.entries[idx];
        if entry.is_default() && entry.phrases.len() == 1 && !force {
            tracing::debug!(phrase, "Refusing to remove last phrase of a default entry");
            return false;
        }

        entry.phrases.remove(phrase);
        if entry.phrases.is_empty() {
            let removed = self.document.entries.remove(idx);
            tracing::info!(action = %removed.action, source = %removed.source, "Command entry removed");
        }
        self.document.stats.forgotten += 1;
        self.rebuild_indexes();
        true
    }
}

/// True if no phrase appears twice, no entry is empty and every confidence
/// is within `[0.0, 1.0]`.
fn is_consistent(document: &DictionaryDocument) -> bool {
    let mut seen = BTreeSet::new();
    document.entries.iter().all(|entry| {
        !entry.phrases.is_empty()
            && (0.0..=1.0).contains(&entry.confidence)
            && entry.phrases.iter().all(|p| seen.insert(p.as_str()))
    })
}

/// Normalize phrases, drop duplicates across entries (first owner wins),
/// clamp confidences and drop entries left without phrases.
fn sanitize(document: &mut DictionaryDocument) -> usize {
    let mut seen = BTreeSet::new();
    let mut repairs = 0;

    for entry in &mut document.entries {
        let original = std::mem::take(&mut entry.phrases);
        let original_len = original.len();
        for phrase in original {
            let normalized = normalize_utterance(&phrase);
            if !normalized.is_empty() && seen.insert(normalized.clone()) {
                entry.phrases.insert(normalized);
            }
        }
        if entry.phrases.len() != original_len {
            repairs += 1;
        }

        let clamped = clamp_confidence(entry.confidence);
        if clamped != entry.confidence {
            entry.confidence = clamped;
            repairs += 1;
        }
    }

    let before = document.entries.len();
    document.entries.retain(|e| !e.phrases.is_empty());
    repairs + (before - document.entries.len())
}

fn seed_entry(phrases: BTreeSet<String>, action: &str) -> CommandEntry {
    let mut entry = CommandEntry::new(
        phrases,
        action.to_string(),
        None,
        DEFAULT_SEED_CONFIDENCE,
        CommandSource::Default,
    );
    entry.seeded = true;
    entry
}

/// Persistent phrase-to-action store with exact and fuzzy lookup.
pub struct CommandDictionary {
    path: PathBuf,
    config: DictionaryConfig,
    inner: RwLock<DictionaryInner>,
}

impl std::fmt::Debug for CommandDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDictionary")
            .field("path", &self.path)
            .field("entries", &self.len())
            .finish()
    }
}

impl CommandDictionary {
    /// Create an empty dictionary backed by `path`. Nothing is read.
    pub fn new(path: impl Into<PathBuf>, config: DictionaryConfig) -> Self {
        Self {
            path: path.into(),
            config,
            inner: RwLock::new(DictionaryInner::empty()),
        }
    }

    /// Load the store at `path`, seed it if empty and build the indexes.
    pub fn open(path: impl Into<PathBuf>, config: DictionaryConfig, seed: &[SeedCommand]) -> Self {
        let dictionary = Self::new(path, config);
        dictionary.load();
        dictionary.migrate_defaults(seed);
        dictionary.build_indexes();
        dictionary
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &DictionaryConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, DictionaryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DictionaryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Read the persisted entries, replacing the in-memory state.
    ///
    /// A missing or corrupt store yields an empty, valid dictionary; the
    /// corrupt file is copied aside so the next save does not destroy it.
    /// Returns the number of entries loaded.
    pub fn load(&self) -> usize {
        let mut document = match store::read_document(&self.path) {
            Ok(Some(document)) => document,
            Ok(None) => {
                tracing::info!(path = %self.path.display(), "No dictionary found, starting empty");
                DictionaryDocument::default()
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Dictionary unreadable, starting empty"
                );
                let backup = self.path.with_extension("json.corrupt");
                if let Err(copy_err) = std::fs::copy(&self.path, &backup) {
                    tracing::warn!(error = %copy_err, "Could not back up corrupt dictionary");
                }
                DictionaryDocument::default()
            }
        };

        let repairs = sanitize(&mut document);
        if repairs > 0 {
            tracing::warn!(repairs, "Repaired inconsistent dictionary entries on load");
        }

        let count = document.entries.len();
        let mut inner = self.write();
        inner.document = document;
        inner.rebuild_indexes();
        tracing::info!(entries = count, "Dictionary loaded");
        count
    }

    /// Persist the whole document atomically.
    pub fn save(&self) -> Result<(), DictionaryError> {
        let snapshot = self.read().document.clone();
        store::write_document(&self.path, &snapshot)
    }

    /// Save if `autosave` is enabled, logging instead of failing.
    pub fn autosave(&self) {
        if !self.config.autosave {
            return;
        }
        if let Err(e) = self.save() {
            tracing::warn!(error = %e, "Dictionary autosave failed");
        }
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Insert the seed set as `default` entries, only when the dictionary is
    /// empty. Seeds sharing an action become one entry. Canonical seed
    /// phrases are claimed before any generated variant, and a variant
    /// already claimed by another entry is skipped.
    ///
    /// Returns the number of entries created.
    pub fn migrate_defaults(&self, seed: &[SeedCommand]) -> usize {
        let mut inner = self.write();
        if !inner.document.entries.is_empty() {
            return 0;
        }

        let mut claimed: BTreeSet<String> = BTreeSet::new();
        let mut by_action: Vec<(&str, BTreeSet<String>)> = Vec::new();

        for command in seed {
            let phrase = normalize_utterance(command.phrase);
            if phrase.is_empty() || !claimed.insert(phrase.clone()) {
                continue;
            }
            match by_action.iter_mut().find(|(a, _)| *a == command.action) {
                Some((_, phrases)) => {
                    phrases.insert(phrase);
                }
                None => by_action.push((command.action, BTreeSet::from([phrase]))),
            }
        }

        for (_, phrases) in &mut by_action {
            let canonical: Vec<String> = phrases.iter().cloned().collect();
            for phrase in canonical {
                for variant in generate_variations(&phrase) {
                    if claimed.insert(variant.clone()) {
                        phrases.insert(variant);
                    }
                }
            }
        }

        let created = by_action.len();
        for (action, phrases) in by_action {
            inner.document.entries.push(seed_entry(phrases, action));
        }
        inner.rebuild_indexes();
        tracing::info!(entries = created, "Seeded default commands");
        created
    }

    /// Re-add seed phrases that no entry owns any more. Restored phrases
    /// join the default entry for their action, or a new one.
    ///
    /// Returns the number of phrases restored.
    pub fn restore_defaults(&self, seed: &[SeedCommand]) -> usize {
        let mut inner = self.write();
        let mut restored: BTreeSet<String> = BTreeSet::new();

        for command in seed {
            let phrase = normalize_utterance(command.phrase);
            if phrase.is_empty()
                || inner.exact.contains_key(&phrase)
                || restored.contains(&phrase)
            {
                continue;
            }
            let existing = inner
                .document
                .entries
                .iter()
                .position(|e| e.is_default() && e.action == command.action);
            match existing {
                Some(idx) => {
                    inner.document.entries[idx].phrases.insert(phrase.clone());
                }
                None => inner
                    .document
                    .entries
                    .push(seed_entry(BTreeSet::from([phrase.clone()]), command.action)),
            }
            restored.insert(phrase);
        }

        if !restored.is_empty() {
            inner.rebuild_indexes();
            tracing::info!(restored = restored.len(), "Restored default command phrases");
        }
        restored.len()
    }

    // =========================================================================
    // Indexes and lookup
    // =========================================================================

    /// Rebuild the exact and fuzzy indexes from the committed entries.
    pub fn build_indexes(&self) {
        self.write().rebuild_indexes();
    }

    /// Find the action for `phrase`.
    ///
    /// Tier 1 is an exact hash hit on the normalized phrase. Tier 2 first
    /// tries exact hits on the phrase's phonetic variants, then the
    /// edit-distance index at `fuzzy_threshold`. Among equally similar
    /// candidates the more confident entry wins.
    pub fn lookup(&self, phrase: &str) -> Option<DictionaryMatch> {
        let query = normalize_utterance(phrase);
        if query.is_empty() {
            return None;
        }
        let inner = self.read();

        if let Some(&idx) = inner.exact.get(&query) {
            return Some(inner.make_match(idx, &query, MatchKind::Exact, 1.0));
        }

        let phonetic = generate_variations(&query)
            .into_iter()
            .filter(|v| *v != query)
            .filter_map(|v| inner.exact.get(&v).map(|&idx| (idx, v)))
            .max_by(|(a_idx, a), (b_idx, b)| {
                let ca = inner.document.entries[*a_idx].confidence;
                let cb = inner.document.entries[*b_idx].confidence;
                ca.partial_cmp(&cb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.cmp(a))
            });
        if let Some((idx, variant)) = phonetic {
            return Some(inner.make_match(idx, &variant, MatchKind::Phonetic, 1.0));
        }

        let hits = inner.fuzzy.search(&query, self.config.fuzzy_threshold);
        let best_score = hits.first()?.similarity;
        let best = hits
            .iter()
            .take_while(|h| (best_score - h.similarity).abs() < 1e-6)
            .filter_map(|h| inner.exact.get(&h.phrase).map(|&idx| (idx, h)))
            .max_by(|(a_idx, a), (b_idx, b)| {
                let ca = inner.document.entries[*a_idx].confidence;
                let cb = inner.document.entries[*b_idx].confidence;
                ca.partial_cmp(&cb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.phrase.cmp(&a.phrase))
            })?;
        let (idx, hit) = best;
        Some(inner.make_match(idx, &hit.phrase, MatchKind::EditDistance, hit.similarity))
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Map `phrase` to `action`. See [`learn_with_target`](Self::learn_with_target).
    pub fn learn(
        &self,
        phrase: &str,
        action: &str,
        source: CommandSource,
        confidence: f32,
    ) -> Option<Uuid> {
        self.learn_with_target(phrase, action, None, source, confidence)
    }

    /// Insert or update the mapping `phrase -> action`.
    ///
    /// If the phrase already maps to the same action the entry keeps the
    /// higher confidence and the stronger source. If it maps to a different
    /// action, the phrase is taken away from the old entry (which is
    /// dropped if left empty) and the new mapping wins.
    ///
    /// Returns the id of the entry now owning the phrase, or `None` if the
    /// phrase normalizes to nothing.
    pub fn learn_with_target(
        &self,
        phrase: &str,
        action: &str,
        target: Option<String>,
        source: CommandSource,
        confidence: f32,
    ) -> Option<Uuid> {
        let phrase = normalize_utterance(phrase);
        if phrase.is_empty() {
            return None;
        }
        let confidence = clamp_confidence(confidence);
        let mut inner = self.write();

        if let Some(&idx) = inner.exact.get(&phrase) {
            let entry = &mut inner.document.entries[idx];
            if entry.action == action {
                entry.confidence = entry.confidence.max(confidence);
                if source.rank() > entry.source.rank() {
                    entry.source = source;
                }
                if target.is_some() {
                    entry.target = target;
                }
                tracing::debug!(phrase = %phrase, action, "Existing mapping reinforced");
                return Some(entry.id);
            }

            let stale_action = entry.action.clone();
            entry.phrases.remove(&phrase);
            if entry.phrases.is_empty() {
                inner.document.entries.remove(idx);
            }
            tracing::info!(phrase = %phrase, from = %stale_action, to = action, "Phrase remapped");
        }

        let entry = CommandEntry::new(
            BTreeSet::from([phrase.clone()]),
            action.to_string(),
            target,
            confidence,
            source,
        );
        let id = entry.id;
        inner.document.entries.push(entry);
        inner.document.stats.learned += 1;
        inner.rebuild_indexes();
        tracing::info!(phrase = %phrase, action, source = %source, "Command learned");
        Some(id)
    }

    /// Record that the user explicitly confirmed `phrase -> action`.
    ///
    /// An entry already mapping the phrase to `action` gains `delta` and
    /// becomes `confirmed`. Otherwise the phrase is learned as a new
    /// confirmed mapping at `confidence + delta`, taking it away from any
    /// other owner.
    pub fn confirm(
        &self,
        phrase: &str,
        action: &str,
        target: Option<String>,
        confidence: f32,
        delta: f32,
    ) -> Option<Uuid> {
        let phrase = normalize_utterance(phrase);
        {
            let mut inner = self.write();
            if let Some(&idx) = inner.exact.get(&phrase) {
                let entry = &mut inner.document.entries[idx];
                if entry.action == action {
                    let confidence = entry.adjust_confidence(delta);
                    entry.seeded |= entry.source == CommandSource::Default;
                    entry.source = CommandSource::Confirmed;
                    if target.is_some() {
                        entry.target = target;
                    }
                    tracing::info!(phrase = %phrase, action, confidence, "Mapping confirmed");
                    return Some(entry.id);
                }
            }
        }
        self.learn_with_target(&phrase, action, target, CommandSource::Confirmed, confidence + delta)
    }

    /// Remove `phrase` from whichever entry owns it, dropping the entry if
    /// it ends up empty. The last phrase of a `default` entry is kept.
    pub fn forget(&self, phrase: &str) -> bool {
        let phrase = normalize_utterance(phrase);
        self.write().remove_phrase(&phrase, false)
    }

    /// Like [`forget`](Self::forget) but also removes default entries.
    pub fn forget_forced(&self, phrase: &str) -> bool {
        let phrase = normalize_utterance(phrase);
        self.write().remove_phrase(&phrase, true)
    }

    /// Remove a whole entry. Default entries require `force`.
    pub fn remove_entry(&self, id: Uuid, force: bool) -> bool {
        let mut inner = self.write();
        let Some(idx) = inner.position(id) else {
            return false;
        };
        if inner.document.entries[idx].is_default() && !force {
            return false;
        }
        let removed = inner.document.entries.remove(idx);
        inner.document.stats.forgotten += 1;
        inner.rebuild_indexes();
        tracing::info!(action = %removed.action, source = %removed.source, "Command entry removed");
        true
    }

    /// Adjust the confidence of the entry owning `phrase`. Returns the new,
    /// clamped value.
    pub fn adjust_confidence(&self, phrase: &str, delta: f32) -> Option<f32> {
        let phrase = normalize_utterance(phrase);
        let mut inner = self.write();
        let idx = *inner.exact.get(&phrase)?;
        Some(inner.document.entries[idx].adjust_confidence(delta))
    }

    /// Adjust the confidence of entry `id`. Returns the new, clamped value.
    pub fn adjust_entry_confidence(&self, id: Uuid, delta: f32) -> Option<f32> {
        let mut inner = self.write();
        let idx = inner.position(id)?;
        Some(inner.document.entries[idx].adjust_confidence(delta))
    }

    /// Count an accepted use of the entry owning `phrase`.
    pub fn record_use(&self, phrase: &str) -> bool {
        let phrase = normalize_utterance(phrase);
        let mut inner = self.write();
        match inner.exact.get(&phrase).copied() {
            Some(idx) => {
                inner.document.entries[idx].touch(Timestamp::now());
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// The entry owning `phrase`, if any.
    pub fn entry_for(&self, phrase: &str) -> Option<CommandEntry> {
        let phrase = normalize_utterance(phrase);
        let inner = self.read();
        inner
            .exact
            .get(&phrase)
            .map(|&idx| inner.document.entries[idx].clone())
    }

    pub fn entry(&self, id: Uuid) -> Option<CommandEntry> {
        let inner = self.read();
        inner.position(id).map(|idx| inner.document.entries[idx].clone())
    }

    pub fn entries(&self) -> Vec<CommandEntry> {
        self.read().document.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.read().document.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of indexed phrases.
    pub fn phrase_count(&self) -> usize {
        self.read().exact.len()
    }

    /// Check the dictionary invariants against the committed state.
    pub fn is_consistent(&self) -> bool {
        let inner = self.read();
        is_consistent(&inner.document)
            && inner.exact.len()
                == inner
                    .document
                    .entries
                    .iter()
                    .map(|e| e.phrases.len())
                    .sum::<usize>()
    }

    // =========================================================================
    // Stats
    // =========================================================================

    pub fn stats(&self) -> DictionaryStats {
        self.read().document.stats.clone()
    }

    pub fn record_tier_hit(&self, tier: ResolutionTier) {
        self.write().document.stats.record_tier(tier);
    }

    pub fn record_error(&self) {
        self.write().document.stats.errors += 1;
    }

    pub fn record_dictation(&self) {
        self.write().document.stats.dictations += 1;
    }
}
