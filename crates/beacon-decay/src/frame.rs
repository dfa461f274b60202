//! Per-frame presentation proxies.
//!
//! The pulse is cosmetic and stateless: `0.9 + 0.1 * sin(now_ms * 0.003)`.
//! It scales beam opacity on top of the decayed intensity and never feeds
//! back into the live set.

use beacon_core::types::{GeoKey, LiveMarker, MarkerVariant};
use serde::Serialize;

/// Angular rate of the beam pulse, radians per millisecond.
pub const PULSE_RATE: f64 = 0.003;

/// Pulse multiplier in `[0.8, 1.0]` for wall time `now_ms`.
pub fn pulse_factor(now_ms: u64) -> f64 {
    0.9 + 0.1 * (now_ms as f64 * PULSE_RATE).sin()
}

/// What the presentation needs to draw one marker this frame.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct MarkerFrame {
    pub key: GeoKey,
    pub lat: f64,
    pub lon: f64,
    pub variant: MarkerVariant,
    /// Glow sprite opacity: the bare intensity.
    pub sprite_opacity: f64,
    /// Beam opacity: base beam opacity, decayed, then pulsed.
    pub beam_opacity: f64,
    /// Beam height multiplier.
    pub beam_height: f64,
}

pub fn frame_for(marker: &LiveMarker, now_ms: u64) -> MarkerFrame {
    let visual = marker.visual();
    MarkerFrame {
        key: marker.key,
        lat: marker.lat,
        lon: marker.lon,
        variant: marker.variant,
        sprite_opacity: marker.intensity,
        beam_opacity: visual.beam_opacity * marker.intensity * pulse_factor(now_ms),
        beam_height: visual.height_scale,
    }
}
