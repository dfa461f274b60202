//! Latest package metadata per location, for tooltip-style lookups.
//!
//! Nothing in the marker lifecycle reads this cache. Entries outlive their
//! markers and are dropped only once the location is no longer live and the
//! entry is older than the history ceiling.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{EventRecord, GeoKey, PackageMeta};

/// The most recent event seen at a location.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct DetailRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub suspicious: bool,
    /// When the core received the event.
    pub received_at: u64,
    /// Transport metadata; `None` when the event carried none.
    pub meta: Option<PackageMeta>,
}

impl DetailRecord {
    pub fn ip(&self) -> &str {
        self.meta
            .as_ref()
            .map(|m| m.ip.as_str())
            .unwrap_or(crate::constants::UNKNOWN_IP)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DetailCache {
    entries: HashMap<GeoKey, DetailRecord>,
}

impl DetailCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `key` with the latest event.
    pub fn upsert(&mut self, key: GeoKey, event: &EventRecord, now: u64) {
        self.entries.insert(
            key,
            DetailRecord {
                latitude: event.latitude,
                longitude: event.longitude,
                suspicious: event.suspicious,
                received_at: now,
                meta: event.meta.clone(),
            },
        );
    }

    pub fn get(&self, key: &GeoKey) -> Option<&DetailRecord> {
        self.entries.get(key)
    }

    /// Drop entries that are not live and older than `ceiling_ms`.
    pub fn prune<F>(&mut self, now: u64, ceiling_ms: u64, is_live: F) -> usize
    where
        F: Fn(&GeoKey) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|key, record| {
            is_live(key) || now.saturating_sub(record.received_at) <= ceiling_ms
        });
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(lat: f64) -> GeoKey {
        GeoKey::from_coords(lat, 0.0).unwrap()
    }

    #[test]
    fn upsert_keeps_latest() {
        let mut cache = DetailCache::new();
        let k = key(1.0);
        cache.upsert(k, &EventRecord::new(1.0, 0.0, false), 10);
        let meta = PackageMeta {
            ip: "192.0.2.7".into(),
            package_id: Some(42),
            ..PackageMeta::default()
        };
        cache.upsert(k, &EventRecord::new(1.00001, 0.0, true).with_meta(meta), 20);

        let rec = cache.get(&k).unwrap();
        assert_eq!(rec.received_at, 20);
        assert!(rec.suspicious);
        assert_eq!(rec.ip(), "192.0.2.7");
        assert_eq!(rec.meta.as_ref().unwrap().package_id, Some(42));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_meta_reports_unknown_ip() {
        let mut cache = DetailCache::new();
        cache.upsert(key(1.0), &EventRecord::new(1.0, 0.0, false), 0);
        assert_eq!(cache.get(&key(1.0)).unwrap().ip(), "unknown");
    }

    #[test]
    fn prune_spares_live_keys() {
        let mut cache = DetailCache::new();
        cache.upsert(key(1.0), &EventRecord::new(1.0, 0.0, false), 0);
        cache.upsert(key(2.0), &EventRecord::new(2.0, 0.0, false), 0);
        cache.upsert(key(3.0), &EventRecord::new(3.0, 0.0, false), 900);

        let live = key(1.0);
        let removed = cache.prune(1_500, 1_000, |k| *k == live);
        assert_eq!(removed, 1);
        assert!(cache.get(&key(1.0)).is_some(), "live entry kept");
        assert!(cache.get(&key(2.0)).is_none(), "stale, not live");
        assert!(cache.get(&key(3.0)).is_some(), "still within ceiling");
    }
}
