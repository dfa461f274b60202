//! Reacts to point-limit and fade-window changes.
//!
//! Raising the fade window pulls points back from the history ledger: every
//! location last seen within the new window that is not currently live is
//! re-admitted, oldest sighting first, until the live set is full. Lowering
//! the window needs nothing here; the next decay pass expires what fell out.
//! Lowering the point limit evicts the oldest admissions at once.
//!
//! The fade window is capped at the history ceiling so a live marker can
//! never outlive its ledger entry.

use beacon_core::constants::MIN_FADE_WINDOW_SECS;
use beacon_core::history::HistoryLedger;
use beacon_core::live_set::LiveSet;
use beacon_core::types::{EvictReason, MarkerCommand};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RetentionController {
    fade_window_secs: u64,
    max_fade_window_secs: u64,
}

impl RetentionController {
    /// `ceiling_ms` is the history ledger's retention ceiling.
    pub fn new(fade_window_secs: u64, ceiling_ms: u64) -> Self {
        let max_fade_window_secs = (ceiling_ms / 1_000).max(MIN_FADE_WINDOW_SECS);
        Self {
            fade_window_secs: fade_window_secs.clamp(MIN_FADE_WINDOW_SECS, max_fade_window_secs),
            max_fade_window_secs,
        }
    }

    pub fn fade_window_secs(&self) -> u64 {
        self.fade_window_secs
    }

    pub fn fade_window_ms(&self) -> u64 {
        beacon_core::constants::fade_window_ms(self.fade_window_secs)
    }

    /// Apply a new fade window, restoring historical points if it grew.
    ///
    /// Returns a `Create` for each restored marker.
    pub fn on_fade_window_change(
        &mut self,
        new_secs: u64,
        ledger: &HistoryLedger,
        live: &mut LiveSet,
        now: u64,
    ) -> Vec<MarkerCommand> {
        let new_secs = new_secs.clamp(MIN_FADE_WINDOW_SECS, self.max_fade_window_secs);
        let previous = self.fade_window_secs;
        self.fade_window_secs = new_secs;
        if new_secs != previous {
            info!(from = previous, to = new_secs, "retention: fade window changed");
        }
        if new_secs <= previous {
            return Vec::new();
        }

        let window_ms = self.fade_window_ms();
        let candidates = ledger.within_window(now, window_ms, |p| !live.contains(&p.key));
        let mut commands = Vec::new();
        for point in candidates {
            if live.is_full() {
                break;
            }
            if live.restore(point) {
                if let Some(marker) = live.get(&point.key) {
                    commands.push(marker.create_command());
                }
            }
        }
        debug!(restored = commands.len(), live = live.len(), "retention: restore pass done");
        commands
    }

    /// Apply a new point limit. Returns an `Evict` for each marker pushed out.
    pub fn on_capacity_change(&self, capacity: usize, live: &mut LiveSet) -> Vec<MarkerCommand> {
        let previous = live.capacity();
        let evicted = live.set_capacity(capacity);
        if live.capacity() != previous {
            info!(
                from = previous,
                to = live.capacity(),
                evicted = evicted.len(),
                "retention: point limit changed"
            );
        }
        evicted
            .into_iter()
            .map(|m| MarkerCommand::Evict {
                key: m.key,
                reason: EvictReason::Capacity,
            })
            .collect()
    }
}
