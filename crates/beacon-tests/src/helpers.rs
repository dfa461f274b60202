//! Shared helpers for scenario and property tests.

use beacon_core::types::{EventRecord, GeoKey, MarkerCommand, PackageMeta};
use beacon_globe::{GlobeConfig, GlobeState};

/// One second on the globe's millisecond clock.
pub const SEC: u64 = 1_000;

/// A globe with the given point limit and fade window, other settings default.
pub fn globe(point_limit: usize, fade_window_secs: u64) -> GlobeState {
    GlobeState::new(&GlobeConfig {
        point_limit,
        fade_window_secs,
        ..GlobeConfig::default()
    })
}

/// Key for in-range coordinates.
///
/// # Panics
///
/// Panics if the coordinates are out of range; test inputs are fixed.
pub fn key(lat: f64, lon: f64) -> GeoKey {
    GeoKey::from_coords(lat, lon).expect("test coordinates in range")
}

/// Benign event without metadata.
pub fn event(lat: f64, lon: f64) -> EventRecord {
    EventRecord::new(lat, lon, false)
}

/// Event sent from `ip`.
pub fn event_from(ip: &str, lat: f64, lon: f64, suspicious: bool) -> EventRecord {
    EventRecord::new(lat, lon, suspicious).with_meta(PackageMeta {
        ip: ip.to_string(),
        ..PackageMeta::default()
    })
}

/// Distinct, well-separated location number `i` (up to 1800 per row).
pub fn spot(i: u32) -> (f64, f64) {
    let lat = (i / 1_800) as f64 - 45.0;
    let lon = (i % 1_800) as f64 * 0.1 - 90.0;
    (lat, lon)
}

/// Live keys in admission order.
pub fn live_keys(g: &GlobeState) -> Vec<GeoKey> {
    g.snapshot().map(|m| m.key).collect()
}

/// Keys evicted by a command batch, in order.
pub fn evicted(commands: &[MarkerCommand]) -> Vec<GeoKey> {
    commands
        .iter()
        .filter(|c| c.is_evict())
        .map(|c| *c.key())
        .collect()
}
