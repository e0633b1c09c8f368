//! Time-indexed fingerprint cache used by the dual-table writer to
//! decide whether a fingerprint's label set has already been persisted
//! to the metrics table this run.

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Local, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

struct Checkpoint {
    first_discovery: DateTime<Utc>,
}

/// Caches fingerprints by first-discovery time so that entries older
/// than a calendar day, or older than `hold_time`, can be evicted
/// without scanning the whole set.
pub struct FingerprintCache {
    fingerprints: HashMap<Fingerprint, Checkpoint>,
    /// Ordered by (discovery time, fingerprint). Insertion order into
    /// this map is therefore guaranteed to be non-decreasing in time,
    /// because the cache has exactly one writer: the write-request
    /// handler, serialized behind a single mutex per destination. That
    /// single-writer guarantee is what lets `shrink` stop at the first
    /// entry it decides to keep instead of scanning to the end.
    timeline: BTreeMap<(DateTime<Utc>, Fingerprint), ()>,
    hold_time: Duration,
}

impl FingerprintCache {
    pub fn new(hold_time: Duration) -> Self {
        Self {
            fingerprints: HashMap::new(),
            timeline: BTreeMap::new(),
            hold_time,
        }
    }

    /// Records `fingerprint` as seen now. Returns `true` if this is the
    /// first time it has been cached (i.e. the caller should persist its
    /// label set), `false` if it was already present.
    pub fn cache(&mut self, fingerprint: Fingerprint) -> bool {
        if self.fingerprints.contains_key(&fingerprint) {
            return false;
        }

        let now = Utc::now();
        self.fingerprints.insert(
            fingerprint,
            Checkpoint {
                first_discovery: now,
            },
        );
        self.timeline.insert((now, fingerprint), ());
        true
    }

    /// Evicts every entry first discovered on a previous calendar day in
    /// local time, or more than `hold_time` ago, whichever comes first
    /// in the timeline. Returns the number of entries removed.
    ///
    /// Relies on `timeline` being time-ordered by construction (see its
    /// doc comment): once an entry is found that should be kept, every
    /// later entry is newer still, so the scan stops there.
    pub fn shrink(&mut self) -> usize {
        let now = Utc::now();
        let today_local = Local::now().date_naive();
        let mut removed = Vec::new();

        for (&(discovered, fp), _) in self.timeline.iter() {
            let stale_day = today_local != discovered.with_timezone(&Local).date_naive();
            let stale_ttl = now.signed_duration_since(discovered)
                > chrono::Duration::from_std(self.hold_time).unwrap_or(chrono::Duration::zero());

            if stale_day || stale_ttl {
                removed.push((discovered, fp));
            } else {
                break;
            }
        }

        for key in &removed {
            self.fingerprints.remove(&key.1);
            self.timeline.remove(key);
        }

        removed.len()
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_is_new_second_is_not() {
        let mut cache = FingerprintCache::new(Duration::from_secs(86_400));
        assert!(cache.cache(42));
        assert!(!cache.cache(42));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn shrink_on_a_fresh_cache_removes_nothing() {
        let mut cache = FingerprintCache::new(Duration::from_secs(86_400));
        cache.cache(1);
        cache.cache(2);
        assert_eq!(cache.shrink(), 0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn shrink_evicts_entries_older_than_hold_time() {
        let mut cache = FingerprintCache::new(Duration::from_secs(0));
        cache.cache(1);
        // hold_time of zero means "older than now", which the first
        // entry already is by the time shrink() reads Utc::now() again.
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(cache.shrink(), 1);
        assert!(cache.is_empty());
    }
}
