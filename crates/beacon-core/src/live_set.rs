//! Bounded set of currently displayed markers.
//!
//! The live set provides:
//! - O(1) lookup by [`GeoKey`]
//! - FIFO eviction by admission order (not by recency of refresh)
//! - Synchronous capacity enforcement on every admission and capacity change
//!
//! Two structures back it: a key → marker map and an admission queue. They
//! always hold the same keys; [`LiveSet::ensure_consistent`] checks this and
//! rebuilds the queue from the map if they ever drift apart.
//!
//! New keys are always admitted, even when the set is full: the set grows to
//! `capacity + 1` for the duration of the call and the oldest admission is
//! evicted before returning.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::constants::{DEFAULT_POINT_LIMIT, MIN_POINT_LIMIT};
use crate::error::LiveSetError;
use crate::types::{GeoKey, HistoricalPoint, LiveMarker, MarkerVariant};

/// Result of [`LiveSet::upsert`].
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert {
    /// The key was not live and has been admitted. `evicted` lists markers
    /// pushed out to restore the capacity bound, oldest first.
    Admitted { evicted: Vec<LiveMarker> },
    /// The key was already live and has been refreshed.
    Refreshed {
        /// Whether this refresh flipped the marker to suspicious.
        became_suspicious: bool,
    },
}

/// Bounded, admission-ordered marker collection.
///
/// Not thread-safe; the owning state is the single writer.
#[derive(Debug, Clone)]
pub struct LiveSet {
    /// Primary storage: key → marker.
    markers: HashMap<GeoKey, LiveMarker>,
    /// Keys in admission order, oldest at the front.
    queue: VecDeque<GeoKey>,
    /// Maximum number of markers, at least [`MIN_POINT_LIMIT`].
    capacity: usize,
    /// Monotonic admission counter, used to rebuild the queue.
    next_seq: u64,
}

impl Default for LiveSet {
    fn default() -> Self {
        Self::new(DEFAULT_POINT_LIMIT)
    }
}

impl LiveSet {
    /// Create an empty set. A zero capacity is clamped to [`MIN_POINT_LIMIT`].
    pub fn new(capacity: usize) -> Self {
        Self {
            markers: HashMap::new(),
            queue: VecDeque::new(),
            capacity: capacity.max(MIN_POINT_LIMIT),
            next_seq: 0,
        }
    }

    /// Admit a new key or refresh an existing one.
    ///
    /// On refresh the hit count is bumped, the decay clock restarts at `now`,
    /// intensity returns to 1, and a suspicious sighting makes the marker
    /// suspicious for good.
    pub fn upsert(
        &mut self,
        key: GeoKey,
        lat: f64,
        lon: f64,
        suspicious: bool,
        now: u64,
    ) -> Upsert {
        self.upsert_seeded(key, lat, lon, suspicious, 1, now)
    }

    /// [`upsert`](Self::upsert), except that a newly admitted marker starts
    /// at `hits` instead of 1. Ingest passes the ledger's running count so a
    /// location that expired and comes back keeps its tally.
    pub fn upsert_seeded(
        &mut self,
        key: GeoKey,
        lat: f64,
        lon: f64,
        suspicious: bool,
        hits: u64,
        now: u64,
    ) -> Upsert {
        if let Some(marker) = self.markers.get_mut(&key) {
            marker.hits = marker.hits.saturating_add(1);
            marker.refreshed_at = now;
            marker.intensity = 1.0;
            let became_suspicious = suspicious && !marker.is_suspicious();
            if became_suspicious {
                marker.variant = MarkerVariant::Suspicious;
            }
            return Upsert::Refreshed { became_suspicious };
        }

        self.push(LiveMarker {
            key,
            lat,
            lon,
            hits: hits.max(1),
            refreshed_at: now,
            variant: MarkerVariant::from_flag(suspicious),
            intensity: 1.0,
            admitted_seq: 0,
        });
        let evicted = self.enforce_capacity();
        Upsert::Admitted { evicted }
    }

    /// Re-admit a historical point, but only while there is room.
    ///
    /// The marker inherits hit count, suspicious flag and last-seen time from
    /// the ledger and starts at full intensity. Returns `false` when the key
    /// is already live or the set is full.
    pub fn restore(&mut self, point: &HistoricalPoint) -> bool {
        if self.markers.contains_key(&point.key) || self.markers.len() >= self.capacity {
            return false;
        }
        self.push(LiveMarker {
            key: point.key,
            lat: point.lat,
            lon: point.lon,
            hits: point.hits,
            refreshed_at: point.last_seen_at,
            variant: MarkerVariant::from_flag(point.suspicious_ever),
            intensity: 1.0,
            admitted_seq: 0,
        });
        debug!(key = %point.key, hits = point.hits, "live_set: restored from history");
        true
    }

    fn push(&mut self, mut marker: LiveMarker) {
        marker.admitted_seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back(marker.key);
        self.markers.insert(marker.key, marker);
    }

    /// Evict oldest admissions until the size bound holds again.
    fn enforce_capacity(&mut self) -> Vec<LiveMarker> {
        let mut evicted = Vec::new();
        while self.markers.len() > self.capacity {
            match self.evict_oldest() {
                Some(m) => evicted.push(m),
                None => break,
            }
        }
        evicted
    }

    /// Remove and return the marker admitted earliest.
    pub fn evict_oldest(&mut self) -> Option<LiveMarker> {
        while let Some(key) = self.queue.pop_front() {
            if let Some(marker) = self.markers.remove(&key) {
                debug!(key = %key, hits = marker.hits, "live_set: evicted oldest");
                return Some(marker);
            }
        }
        None
    }

    /// Remove a marker by key. Returns `None` if it was not live.
    pub fn remove(&mut self, key: &GeoKey) -> Option<LiveMarker> {
        let marker = self.markers.remove(key)?;
        self.queue.retain(|k| k != key);
        Some(marker)
    }

    /// Keep only markers for which `keep` returns `true`, in a single pass over
    /// the admission queue. `keep` may adjust a marker it keeps. Returns the
    /// removed markers in admission order.
    pub fn retain<F>(&mut self, mut keep: F) -> Vec<LiveMarker>
    where
        F: FnMut(&mut LiveMarker) -> bool,
    {
        let mut removed = Vec::new();
        let markers = &mut self.markers;
        self.queue.retain(|key| {
            let Some(marker) = markers.get_mut(key) else {
                return false;
            };
            if keep(marker) {
                return true;
            }
            if let Some(m) = markers.remove(key) {
                removed.push(m);
            }
            false
        });
        removed
    }

    /// Change the point limit. Shrinking evicts the oldest admissions
    /// immediately. Returns the evicted markers, oldest first.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<LiveMarker> {
        self.capacity = capacity.max(MIN_POINT_LIMIT);
        self.enforce_capacity()
    }

    /// Markers in admission order, oldest first.
    pub fn snapshot(&self) -> impl Iterator<Item = &LiveMarker> {
        self.queue.iter().filter_map(|k| self.markers.get(k))
    }

    /// Keys in admission order, oldest first.
    pub fn keys(&self) -> impl Iterator<Item = &GeoKey> {
        self.queue.iter()
    }

    pub fn get(&self, key: &GeoKey) -> Option<&LiveMarker> {
        self.markers.get(key)
    }

    pub fn contains(&self, key: &GeoKey) -> bool {
        self.markers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether another admission would push out the oldest marker.
    pub fn is_full(&self) -> bool {
        self.markers.len() >= self.capacity
    }

    /// Verify queue/map agreement and the size bound without modifying anything.
    pub fn check_consistency(&self) -> Result<(), LiveSetError> {
        if self.queue.len() != self.markers.len() {
            return Err(LiveSetError::Desync {
                queued: self.queue.len(),
                mapped: self.markers.len(),
            });
        }
        let mut seen = HashSet::with_capacity(self.queue.len());
        for key in &self.queue {
            if !self.markers.contains_key(key) {
                return Err(LiveSetError::Orphan(key.to_string()));
            }
            if !seen.insert(*key) {
                return Err(LiveSetError::Duplicate(key.to_string()));
            }
        }
        if self.markers.len() > self.capacity {
            return Err(LiveSetError::OverCapacity {
                len: self.markers.len(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Check consistency and repair the set if it has drifted.
    ///
    /// Panics in debug builds. In release builds the queue is rebuilt from the
    /// map in admission order, the size bound is re-applied, and `true` is
    /// returned.
    pub fn ensure_consistent(&mut self) -> bool {
        let Err(err) = self.check_consistency() else {
            return false;
        };
        debug_assert!(false, "live set invariant violated: {err}");
        warn!(%err, "live_set: invariant violated, rebuilding queue");
        self.rebuild_queue();
        self.enforce_capacity();
        true
    }

    fn rebuild_queue(&mut self) {
        let mut entries: Vec<(u64, GeoKey)> = self
            .markers
            .values()
            .map(|m| (m.admitted_seq, m.key))
            .collect();
        entries.sort_unstable();
        self.queue = entries.into_iter().map(|(_, k)| k).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(i: u32) -> GeoKey {
        GeoKey::from_coords(i as f64 * 0.01, 0.0).unwrap()
    }

    fn admit(set: &mut LiveSet, i: u32, now: u64) -> Upsert {
        let k = key(i);
        set.upsert(k, k.lat(), k.lon(), false, now)
    }

    fn live_keys(set: &LiveSet) -> Vec<GeoKey> {
        set.keys().copied().collect()
    }

    // ------------------------------------------------------------------
    // Basic operations
    // ------------------------------------------------------------------

    #[test]
    fn new_set_is_empty() {
        let set = LiveSet::new(10);
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert_eq!(set.capacity(), 10);
    }

    #[test]
    fn zero_capacity_clamped() {
        let set = LiveSet::new(0);
        assert_eq!(set.capacity(), MIN_POINT_LIMIT);
    }

    #[test]
    fn default_capacity() {
        assert_eq!(LiveSet::default().capacity(), DEFAULT_POINT_LIMIT);
    }

    #[test]
    fn upsert_new_key_admits() {
        let mut set = LiveSet::new(10);
        let out = admit(&mut set, 1, 100);
        assert_eq!(out, Upsert::Admitted { evicted: vec![] });

        let m = set.get(&key(1)).unwrap();
        assert_eq!(m.hits, 1);
        assert_eq!(m.refreshed_at, 100);
        assert_eq!(m.intensity, 1.0);
        assert_eq!(m.variant, MarkerVariant::Benign);
    }

    #[test]
    fn upsert_existing_key_refreshes() {
        let mut set = LiveSet::new(10);
        admit(&mut set, 1, 100);
        let out = admit(&mut set, 1, 200);
        assert_eq!(out, Upsert::Refreshed { became_suspicious: false });
        assert_eq!(set.len(), 1);

        let m = set.get(&key(1)).unwrap();
        assert_eq!(m.hits, 2);
        assert_eq!(m.refreshed_at, 200);
    }

    #[test]
    fn seeded_admission_starts_at_given_hits() {
        let mut set = LiveSet::new(10);
        let k = key(1);
        set.upsert_seeded(k, k.lat(), k.lon(), false, 7, 0);
        assert_eq!(set.get(&k).unwrap().hits, 7);
        // The seed only applies to admission.
        set.upsert_seeded(k, k.lat(), k.lon(), false, 99, 1);
        assert_eq!(set.get(&k).unwrap().hits, 8);
    }

    #[test]
    fn suspicious_flip_is_reported_once() {
        let mut set = LiveSet::new(10);
        let k = key(1);
        set.upsert(k, 0.0, 0.0, false, 0);
        assert_eq!(
            set.upsert(k, 0.0, 0.0, true, 1),
            Upsert::Refreshed { became_suspicious: true }
        );
        assert_eq!(
            set.upsert(k, 0.0, 0.0, true, 2),
            Upsert::Refreshed { became_suspicious: false }
        );
        // A later benign sighting does not revert the variant.
        set.upsert(k, 0.0, 0.0, false, 3);
        assert!(set.get(&k).unwrap().is_suspicious());
    }

    #[test]
    fn refresh_does_not_reorder_queue() {
        let mut set = LiveSet::new(2);
        admit(&mut set, 1, 0);
        admit(&mut set, 2, 1);
        admit(&mut set, 1, 2); // refresh oldest; FIFO is by admission
        let out = admit(&mut set, 3, 3);
        match out {
            Upsert::Admitted { evicted } => {
                assert_eq!(evicted.len(), 1);
                assert_eq!(evicted[0].key, key(1));
            }
            other => panic!("expected admission, got {other:?}"),
        }
        assert_eq!(live_keys(&set), vec![key(2), key(3)]);
    }

    // ------------------------------------------------------------------
    // Capacity
    // ------------------------------------------------------------------

    #[test]
    fn full_set_admits_and_evicts_oldest() {
        let mut set = LiveSet::new(2);
        admit(&mut set, 1, 0);
        admit(&mut set, 2, 0);
        admit(&mut set, 3, 0);
        assert_eq!(set.len(), 2);
        assert_eq!(live_keys(&set), vec![key(2), key(3)]);
        assert!(set.check_consistency().is_ok());
    }

    #[test]
    fn shrink_capacity_evicts_oldest_immediately() {
        let mut set = LiveSet::new(10);
        for i in 0..10 {
            admit(&mut set, i, i as u64);
        }
        let evicted = set.set_capacity(3);
        assert_eq!(evicted.len(), 7);
        assert_eq!(
            evicted.iter().map(|m| m.key).collect::<Vec<_>>(),
            (0..7).map(key).collect::<Vec<_>>()
        );
        assert_eq!(live_keys(&set), vec![key(7), key(8), key(9)]);
    }

    #[test]
    fn grow_capacity_evicts_nothing() {
        let mut set = LiveSet::new(3);
        for i in 0..3 {
            admit(&mut set, i, 0);
        }
        assert!(set.set_capacity(10).is_empty());
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn set_capacity_zero_clamps() {
        let mut set = LiveSet::new(3);
        for i in 0..3 {
            admit(&mut set, i, 0);
        }
        let evicted = set.set_capacity(0);
        assert_eq!(set.capacity(), 1);
        assert_eq!(evicted.len(), 2);
        assert_eq!(live_keys(&set), vec![key(2)]);
    }

    // ------------------------------------------------------------------
    // Restore / remove / retain
    // ------------------------------------------------------------------

    fn point(i: u32, hits: u64, last_seen_at: u64, suspicious: bool) -> HistoricalPoint {
        let k = key(i);
        HistoricalPoint {
            key: k,
            lat: k.lat(),
            lon: k.lon(),
            hits,
            last_seen_at,
            suspicious_ever: suspicious,
        }
    }

    #[test]
    fn restore_inherits_history() {
        let mut set = LiveSet::new(5);
        assert!(set.restore(&point(1, 7, 1_234, true)));
        let m = set.get(&key(1)).unwrap();
        assert_eq!(m.hits, 7);
        assert_eq!(m.refreshed_at, 1_234);
        assert_eq!(m.intensity, 1.0);
        assert!(m.is_suspicious());
    }

    #[test]
    fn restore_refuses_when_full_or_present() {
        let mut set = LiveSet::new(1);
        assert!(set.restore(&point(1, 1, 0, false)));
        assert!(!set.restore(&point(1, 5, 0, false)), "already live");
        assert!(!set.restore(&point(2, 1, 0, false)), "full");
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&key(1)).unwrap().hits, 1);
    }

    #[test]
    fn remove_cleans_queue() {
        let mut set = LiveSet::new(5);
        admit(&mut set, 1, 0);
        admit(&mut set, 2, 0);
        let m = set.remove(&key(1)).unwrap();
        assert_eq!(m.key, key(1));
        assert_eq!(live_keys(&set), vec![key(2)]);
        assert!(set.remove(&key(1)).is_none());
        assert!(set.check_consistency().is_ok());
    }

    #[test]
    fn evict_oldest_on_empty_is_none() {
        let mut set = LiveSet::new(5);
        assert!(set.evict_oldest().is_none());
    }

    #[test]
    fn retain_removes_in_admission_order_and_mutates_kept() {
        let mut set = LiveSet::new(10);
        for i in 0..6 {
            admit(&mut set, i, 0);
        }
        let removed = set.retain(|m| {
            m.intensity = 0.5;
            m.key != key(1) && m.key != key(4)
        });
        assert_eq!(
            removed.iter().map(|m| m.key).collect::<Vec<_>>(),
            vec![key(1), key(4)]
        );
        assert_eq!(live_keys(&set), vec![key(0), key(2), key(3), key(5)]);
        assert!(set.snapshot().all(|m| m.intensity == 0.5));
        assert!(set.check_consistency().is_ok());
    }

    #[test]
    fn snapshot_in_admission_order() {
        let mut set = LiveSet::new(10);
        for i in [5, 3, 9] {
            admit(&mut set, i, 0);
        }
        let keys: Vec<_> = set.snapshot().map(|m| m.key).collect();
        assert_eq!(keys, vec![key(5), key(3), key(9)]);
    }

    // ------------------------------------------------------------------
    // Consistency
    // ------------------------------------------------------------------

    #[test]
    fn rebuild_queue_restores_admission_order() {
        let mut set = LiveSet::new(10);
        for i in 0..4 {
            admit(&mut set, i, 0);
        }
        set.queue.clear();
        set.queue.push_back(key(2));
        assert!(matches!(
            set.check_consistency(),
            Err(LiveSetError::Desync { queued: 1, mapped: 4 })
        ));

        set.rebuild_queue();
        assert!(set.check_consistency().is_ok());
        assert_eq!(live_keys(&set), (0..4).map(key).collect::<Vec<_>>());
    }

    #[test]
    fn duplicate_queue_entry_detected() {
        let mut set = LiveSet::new(10);
        admit(&mut set, 1, 0);
        admit(&mut set, 2, 0);
        set.queue[1] = key(1);
        assert_eq!(
            set.check_consistency(),
            Err(LiveSetError::Duplicate(key(1).to_string()))
        );
    }

    #[test]
    fn consistent_set_needs_no_repair() {
        let mut set = LiveSet::new(3);
        for i in 0..5 {
            admit(&mut set, i, 0);
        }
        assert!(!set.ensure_consistent());
    }

    proptest! {
        #[test]
        fn size_never_exceeds_capacity(
            capacity in 1usize..20,
            keys in proptest::collection::vec(0u32..40, 0..200),
        ) {
            let mut set = LiveSet::new(capacity);
            for (t, i) in keys.into_iter().enumerate() {
                admit(&mut set, i, t as u64);
                prop_assert!(set.len() <= capacity);
                prop_assert!(set.check_consistency().is_ok());
            }
        }

        #[test]
        fn hits_never_decrease(keys in proptest::collection::vec(0u32..5, 1..100)) {
            let mut set = LiveSet::new(5);
            let mut last: HashMap<GeoKey, u64> = HashMap::new();
            for (t, i) in keys.into_iter().enumerate() {
                admit(&mut set, i, t as u64);
                let hits = set.get(&key(i)).unwrap().hits;
                if let Some(prev) = last.insert(key(i), hits) {
                    prop_assert!(hits > prev);
                }
            }
        }
    }
}
