//! The globe's owned state and its time-driven operations.
//!
//! [`GlobeState`] is the single writer for the ledger, the live set and the
//! side caches. Every operation takes `&mut self` and the current time in
//! milliseconds, so an event and a tick can never interleave and every
//! decision is reproducible from recorded timestamps.
//!
//! Event ingest lives in [`crate::ingest`].

use beacon_core::detail::{DetailCache, DetailRecord};
use beacon_core::error::GlobeError;
use beacon_core::history::HistoryLedger;
use beacon_core::live_set::LiveSet;
use beacon_core::stats::{StatsBoard, StatsSummary};
use beacon_core::types::{GeoKey, LiveMarker, MarkerCommand};
use beacon_decay::{DecayEngine, MarkerFrame, frame_for};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{GlobeConfig, Preset};
use crate::retention::RetentionController;

/// Tooltip view of a live marker.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct MarkerDetail {
    pub key: GeoKey,
    pub hits: u64,
    /// Last admission or refresh of the marker.
    pub last_update: u64,
    pub detail: DetailRecord,
}

#[derive(Debug, Clone)]
pub struct GlobeState {
    pub(crate) ledger: HistoryLedger,
    pub(crate) live: LiveSet,
    pub(crate) details: DetailCache,
    pub(crate) stats: StatsBoard,
    decay: DecayEngine,
    retention: RetentionController,
}

impl Default for GlobeState {
    fn default() -> Self {
        Self::new(&GlobeConfig::default())
    }
}

impl GlobeState {
    pub fn new(config: &GlobeConfig) -> Self {
        let config = config.clone().sanitized();
        let ceiling_ms = config.history_ceiling_ms();
        Self {
            ledger: HistoryLedger::new(ceiling_ms),
            live: LiveSet::new(config.point_limit),
            details: DetailCache::new(),
            stats: StatsBoard::new(),
            decay: DecayEngine::new(),
            retention: RetentionController::new(config.fade_window_secs, ceiling_ms),
        }
    }

    /// Per-frame cleanup: decay and expire live markers, then prune history
    /// and stale details.
    pub fn tick(&mut self, now: u64) -> Vec<MarkerCommand> {
        let commands = self
            .decay
            .tick(&mut self.live, now, self.retention.fade_window_ms());

        let pruned = self.ledger.prune(now);
        let live = &self.live;
        let dropped = self
            .details
            .prune(now, self.ledger.ceiling_ms(), |k| live.contains(k));
        if pruned > 0 || dropped > 0 {
            debug!(pruned, dropped, "tick: forgot stale locations");
        }

        self.live.ensure_consistent();
        commands
    }

    /// Change the point limit; shrinking evicts the oldest admissions now.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<MarkerCommand> {
        self.retention.on_capacity_change(capacity, &mut self.live)
    }

    /// Change the fade window. A larger window restores historical points;
    /// a cleanup pass runs either way.
    pub fn set_fade_window(&mut self, secs: u64, now: u64) -> Vec<MarkerCommand> {
        let mut commands =
            self.retention
                .on_fade_window_change(secs, &self.ledger, &mut self.live, now);
        commands.extend(self.tick(now));
        commands
    }

    /// Apply a preset's point limit, then its fade window.
    pub fn apply_preset(&mut self, preset: Preset, now: u64) -> Vec<MarkerCommand> {
        let (points, fade) = preset.limits();
        info!(%preset, points, fade, "applying preset");
        let mut commands = self.set_capacity(points);
        commands.extend(self.set_fade_window(fade, now));
        commands
    }

    /// Live markers in admission order.
    pub fn snapshot(&self) -> impl Iterator<Item = &LiveMarker> {
        self.live.snapshot()
    }

    /// Presentation proxies for every live marker at wall time `now`.
    pub fn frame(&self, now: u64) -> Vec<MarkerFrame> {
        self.live.snapshot().map(|m| frame_for(m, now)).collect()
    }

    /// Latest metadata seen at `key`, live or not.
    pub fn lookup_detail(&self, key: &GeoKey) -> Option<&DetailRecord> {
        self.details.get(key)
    }

    /// Tooltip for a live marker: its latest detail joined with hit count
    /// and last update.
    pub fn describe(&self, key: &GeoKey) -> Option<MarkerDetail> {
        let marker = self.live.get(key)?;
        let detail = self.details.get(key)?;
        Some(MarkerDetail {
            key: *key,
            hits: marker.hits,
            last_update: marker.refreshed_at,
            detail: detail.clone(),
        })
    }

    pub fn stats(&mut self, now: u64) -> StatsSummary {
        self.stats.summary(now)
    }

    /// Accepted events so far.
    pub fn total_packages(&self) -> u64 {
        self.stats.total_packages()
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn live(&self) -> &LiveSet {
        &self.live
    }

    pub fn capacity(&self) -> usize {
        self.live.capacity()
    }

    pub fn fade_window_secs(&self) -> u64 {
        self.retention.fade_window_secs()
    }

    /// Verify cross-structure invariants: live set consistency and that
    /// every live key has a ledger entry.
    pub fn check_invariants(&self) -> Result<(), GlobeError> {
        self.live.check_consistency()?;
        if let Some(gap) = self.live.keys().find(|k| !self.ledger.contains(k)) {
            return Err(GlobeError::LedgerGap(gap.to_string()));
        }
        Ok(())
    }
}
