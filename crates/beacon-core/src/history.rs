//! Historical ledger of every location seen within the history ceiling.
//!
//! The ledger is the source of truth for restoring markers when the fade
//! window grows, and a superset of the live set: a key is never live without
//! a ledger entry. Entries are folded per [`GeoKey`]; repeated sightings bump
//! the hit count, refresh `last_seen_at` and OR in the suspicious flag.
//!
//! Pruning is driven by a fixed ceiling that does not follow the fade window.

use std::collections::HashMap;

use tracing::debug;

use crate::constants::HISTORY_CEILING_MS;
use crate::types::{GeoKey, HistoricalPoint};

/// Ledger of historical points keyed by location.
///
/// Not thread-safe; the owning state is the single writer.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    points: HashMap<GeoKey, HistoricalPoint>,
    ceiling_ms: u64,
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(HISTORY_CEILING_MS)
    }
}

impl HistoryLedger {
    /// Create an empty ledger that forgets points idle for longer than `ceiling_ms`.
    pub fn new(ceiling_ms: u64) -> Self {
        Self {
            points: HashMap::new(),
            ceiling_ms,
        }
    }

    /// Record a sighting, creating the point on first sight.
    ///
    /// `lat`/`lon` are only stored on creation; later sightings keep the
    /// original position.
    pub fn record(
        &mut self,
        key: GeoKey,
        lat: f64,
        lon: f64,
        suspicious: bool,
        now: u64,
    ) -> &HistoricalPoint {
        self.points
            .entry(key)
            .and_modify(|p| {
                p.hits = p.hits.saturating_add(1);
                p.last_seen_at = now;
                p.suspicious_ever |= suspicious;
            })
            .or_insert_with(|| HistoricalPoint {
                key,
                lat,
                lon,
                hits: 1,
                last_seen_at: now,
                suspicious_ever: suspicious,
            })
    }

    /// Drop every point idle for longer than the ceiling. Returns the number removed.
    pub fn prune(&mut self, now: u64) -> usize {
        let ceiling = self.ceiling_ms;
        let before = self.points.len();
        self.points
            .retain(|_, p| now.saturating_sub(p.last_seen_at) <= ceiling);
        let removed = before - self.points.len();
        if removed > 0 {
            debug!(removed, remaining = self.points.len(), "history: pruned");
        }
        removed
    }

    /// All points matching `predicate`, in arbitrary order.
    pub fn query<F>(&self, mut predicate: F) -> Vec<&HistoricalPoint>
    where
        F: FnMut(&HistoricalPoint) -> bool,
    {
        self.points.values().filter(|p| predicate(p)).collect()
    }

    /// Points last seen strictly less than `window_ms` before `now` that pass
    /// `include`, oldest sighting first.
    pub fn within_window<F>(&self, now: u64, window_ms: u64, mut include: F) -> Vec<&HistoricalPoint>
    where
        F: FnMut(&HistoricalPoint) -> bool,
    {
        let mut points =
            self.query(|p| now.saturating_sub(p.last_seen_at) < window_ms && include(p));
        points.sort_by(|a, b| a.last_seen_at.cmp(&b.last_seen_at).then(a.key.cmp(&b.key)));
        points
    }

    pub fn get(&self, key: &GeoKey) -> Option<&HistoricalPoint> {
        self.points.get(key)
    }

    pub fn contains(&self, key: &GeoKey) -> bool {
        self.points.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn ceiling_ms(&self) -> u64 {
        self.ceiling_ms
    }

    /// Iterate over all points (arbitrary order).
    pub fn iter(&self) -> impl Iterator<Item = &HistoricalPoint> {
        self.points.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(lat: f64, lon: f64) -> GeoKey {
        GeoKey::from_coords(lat, lon).unwrap()
    }

    #[test]
    fn first_sighting_creates_point() {
        let mut ledger = HistoryLedger::default();
        let k = key(1.0, 2.0);
        let p = ledger.record(k, 1.0, 2.0, false, 100);
        assert_eq!(p.hits, 1);
        assert_eq!(p.last_seen_at, 100);
        assert!(!p.suspicious_ever);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn repeat_sighting_folds_into_point() {
        let mut ledger = HistoryLedger::default();
        let k = key(1.0, 2.0);
        ledger.record(k, 1.0, 2.0, false, 100);
        ledger.record(k, 1.00001, 2.00001, true, 200);
        let p = ledger.record(k, 1.0, 2.0, false, 300);

        assert_eq!(p.hits, 3);
        assert_eq!(p.last_seen_at, 300);
        assert!(p.suspicious_ever, "suspicious flag is sticky");
        assert_eq!(p.lat, 1.0, "position is kept from the first sighting");
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn prune_removes_only_points_past_ceiling() {
        let mut ledger = HistoryLedger::new(1_000);
        ledger.record(key(1.0, 1.0), 1.0, 1.0, false, 0);
        ledger.record(key(2.0, 2.0), 2.0, 2.0, false, 500);

        // Exactly at the ceiling is kept.
        assert_eq!(ledger.prune(1_000), 0);
        assert_eq!(ledger.prune(1_001), 1);
        assert!(!ledger.contains(&key(1.0, 1.0)));
        assert!(ledger.contains(&key(2.0, 2.0)));
    }

    #[test]
    fn refresh_extends_retention() {
        let mut ledger = HistoryLedger::new(1_000);
        let k = key(1.0, 1.0);
        ledger.record(k, 1.0, 1.0, false, 0);
        ledger.record(k, 1.0, 1.0, false, 900);
        assert_eq!(ledger.prune(1_500), 0);
        assert_eq!(ledger.get(&k).unwrap().hits, 2);
    }

    #[test]
    fn query_filters_by_predicate() {
        let mut ledger = HistoryLedger::default();
        ledger.record(key(1.0, 1.0), 1.0, 1.0, true, 0);
        ledger.record(key(2.0, 2.0), 2.0, 2.0, false, 0);
        ledger.record(key(3.0, 3.0), 3.0, 3.0, true, 0);

        let suspicious = ledger.query(|p| p.suspicious_ever);
        assert_eq!(suspicious.len(), 2);
    }

    #[test]
    fn within_window_sorted_oldest_first() {
        let mut ledger = HistoryLedger::default();
        ledger.record(key(3.0, 3.0), 3.0, 3.0, false, 3_000);
        ledger.record(key(1.0, 1.0), 1.0, 1.0, false, 1_000);
        ledger.record(key(2.0, 2.0), 2.0, 2.0, false, 2_000);
        ledger.record(key(0.5, 0.5), 0.5, 0.5, false, 0);

        // now=10_000, window=10_000: the point at t=0 is exactly at the edge and excluded.
        let pts = ledger.within_window(10_000, 10_000, |_| true);
        let times: Vec<u64> = pts.iter().map(|p| p.last_seen_at).collect();
        assert_eq!(times, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn within_window_respects_include() {
        let mut ledger = HistoryLedger::default();
        let skip = key(1.0, 1.0);
        ledger.record(skip, 1.0, 1.0, false, 0);
        ledger.record(key(2.0, 2.0), 2.0, 2.0, false, 0);
        let pts = ledger.within_window(10, 1_000, |p| p.key != skip);
        assert_eq!(pts.len(), 1);
        assert_eq!(pts[0].key, key(2.0, 2.0));
    }
}
