//! Event ingest: the single entry point for incoming package events.
//!
//! One call folds an event into every structure keyed by its location, in a
//! fixed order: history ledger, live set, detail cache, statistics. A rejected
//! event (bad coordinates) touches none of them.

use beacon_core::error::GlobeError;
use beacon_core::live_set::Upsert;
use beacon_core::types::{EventRecord, EvictReason, GeoKey, MarkerCommand};
use tracing::debug;

use crate::state::GlobeState;

impl GlobeState {
    /// Ingest one event at time `now`.
    ///
    /// - New location, room left: `Create`.
    /// - New location, set full: `Create`, then `Evict` for the oldest admission.
    /// - Live location: `Update`, preceded by `Replace` if this sighting made
    ///   the marker suspicious.
    pub fn ingest(&mut self, event: EventRecord, now: u64) -> Result<Vec<MarkerCommand>, GlobeError> {
        let key = GeoKey::from_coords(event.latitude, event.longitude)?;
        let (lat, lon, suspicious) = (event.latitude, event.longitude, event.suspicious);

        let point = self.ledger.record(key, lat, lon, suspicious, now);
        let (hits, suspicious_ever) = (point.hits, point.suspicious_ever);

        let mut commands = Vec::new();
        match self.live.upsert_seeded(key, lat, lon, suspicious_ever, hits, now) {
            Upsert::Admitted { evicted } => {
                if let Some(marker) = self.live.get(&key) {
                    commands.push(marker.create_command());
                }
                for old in evicted {
                    debug!(key = %old.key, by = %key, "ingest: capacity eviction");
                    commands.push(MarkerCommand::Evict {
                        key: old.key,
                        reason: EvictReason::Capacity,
                    });
                }
            }
            Upsert::Refreshed { became_suspicious } => {
                if let Some(marker) = self.live.get(&key) {
                    if became_suspicious {
                        debug!(key = %key, "ingest: marker turned suspicious");
                        commands.push(marker.replace_command());
                    }
                    commands.push(marker.update_command());
                }
            }
        }

        self.details.upsert(key, &event, now);
        self.stats.record(&event, now);
        Ok(commands)
    }
}
