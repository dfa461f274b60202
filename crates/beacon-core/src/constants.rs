//! Tuning constants. All durations are in milliseconds unless the name says otherwise.

/// Default number of markers displayed at once.
pub const DEFAULT_POINT_LIMIT: usize = 50;

/// Smallest accepted point limit; lower requests are clamped up to this.
pub const MIN_POINT_LIMIT: usize = 1;

/// Default fade window in seconds.
pub const DEFAULT_FADE_WINDOW_SECS: u64 = 30;

/// Smallest accepted fade window in seconds.
pub const MIN_FADE_WINDOW_SECS: u64 = 1;

/// How long a location is remembered after its last sighting (1 hour).
///
/// Independent of the fade window: shrinking the fade window hides markers,
/// it never forgets them.
pub const HISTORY_CEILING_MS: u64 = 3_600_000;

/// Fraction of the fade window during which a marker stays at full intensity.
pub const FADE_START_FRACTION: f64 = 0.8;

/// Decimal places kept when deriving a [`GeoKey`](crate::types::GeoKey).
pub const GEO_KEY_DECIMALS: u32 = 4;

/// `10^GEO_KEY_DECIMALS`, the fixed-point scale of a geo key.
pub const GEO_KEY_SCALE: f64 = 10_000.0;

/// Beam height grows by this much per hit...
pub const BEAM_HEIGHT_PER_HIT: f64 = 0.3;

/// ...and saturates here.
pub const BEAM_HEIGHT_MAX: f64 = 4.0;

/// Beam opacity at zero hits.
pub const BEAM_OPACITY_BASE: f64 = 0.4;

/// Beam opacity gained per hit.
pub const BEAM_OPACITY_PER_HIT: f64 = 0.01;

/// Beam opacity ceiling.
pub const BEAM_OPACITY_MAX: f64 = 0.5;

/// Width of the trailing window used for the recent package rate.
pub const RATE_WINDOW_MS: u64 = 60_000;

/// IP recorded for events that arrive without metadata.
pub const UNKNOWN_IP: &str = "unknown";

/// Convert a fade window in seconds to milliseconds.
pub fn fade_window_ms(secs: u64) -> u64 {
    secs.saturating_mul(1_000)
}
