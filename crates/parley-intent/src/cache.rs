//! Short-lived memo of tier-3 answers, keyed by normalized utterance.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::classifier::Classification;

/// TTL cache of classifier answers. Only successful answers are stored, so
/// a failed call is retried by the next utterance.
#[derive(Debug)]
pub struct ClassificationCache {
    ttl: Duration,
    entries: HashMap<String, (Instant, Classification)>,
}

impl ClassificationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// The cached answer for `key`, if still fresh. Expired entries are
    /// dropped on access.
    pub fn get(&mut self, key: &str) -> Option<Classification> {
        let fresh = match self.entries.get(key) {
            Some((stored_at, _)) => stored_at.elapsed() < self.ttl,
            None => return None,
        };
        if !fresh {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|(_, c)| c.clone())
    }

    pub fn insert(&mut self, key: String, classification: Classification) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(key, (Instant::now(), classification));
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let mut cache = ClassificationCache::new(Duration::from_secs(300));
        cache.insert("open spotify".to_string(), Classification::new("OPEN_APP", 0.9));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.get("open spotify").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("open spotify").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let mut cache = ClassificationCache::new(Duration::from_secs(10));
        cache.insert("a".to_string(), Classification::none());
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.insert("b".to_string(), Classification::none());
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_zero_ttl_disables_cache() {
        let mut cache = ClassificationCache::new(Duration::ZERO);
        cache.insert("a".to_string(), Classification::none());
        assert!(cache.get("a").is_none());
    }
}
