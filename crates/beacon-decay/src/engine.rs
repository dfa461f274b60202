//! Decay engine: one pass over the live set per tick.
//!
//! The engine is stateless apart from its curve. Every decision is a pure
//! function of each marker's `refreshed_at`, the supplied `now` and the fade
//! window, so replaying recorded ticks reproduces the same commands.

use beacon_core::live_set::LiveSet;
use beacon_core::traits::IntensityCurve;
use beacon_core::types::{EvictReason, LiveMarker, MarkerCommand};
use tracing::debug;

use crate::curve::LinearFade;

/// Applies an [`IntensityCurve`] to every live marker.
#[derive(Debug, Clone, Default)]
pub struct DecayEngine<C = LinearFade> {
    curve: C,
}

impl DecayEngine {
    /// Create an engine with the default linear fade.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: IntensityCurve> DecayEngine<C> {
    pub fn with_curve(curve: C) -> Self {
        Self { curve }
    }

    pub fn curve(&self) -> &C {
        &self.curve
    }

    /// Intensity `marker` should have at `now`, or `None` if it has expired.
    pub fn intensity_at(&self, marker: &LiveMarker, now: u64, window_ms: u64) -> Option<f64> {
        self.curve.intensity(marker.age(now), window_ms)
    }

    /// Recompute every marker's intensity and evict the expired ones.
    ///
    /// Emits an `Update` for each marker whose intensity changed and an
    /// `Evict { reason: Expired }` for each removed marker, updates first.
    /// Runs in O(live markers).
    pub fn tick(&self, live: &mut LiveSet, now: u64, window_ms: u64) -> Vec<MarkerCommand> {
        let mut commands = Vec::new();
        let expired = live.retain(|marker| match self.intensity_at(marker, now, window_ms) {
            Some(intensity) => {
                if intensity != marker.intensity {
                    marker.intensity = intensity;
                    commands.push(marker.update_command());
                }
                true
            }
            None => false,
        });

        for marker in expired {
            debug!(key = %marker.key, age_ms = marker.age(now), "decay: expired");
            commands.push(MarkerCommand::Evict {
                key: marker.key,
                reason: EvictReason::Expired,
            });
        }
        commands
    }
}
