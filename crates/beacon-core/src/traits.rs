//! Trait seams between crates.
//!
//! - [`IntensityCurve`]: age-to-intensity mapping (beacon-decay implements)

/// Maps a marker's age to its presentation intensity.
///
/// Implementations must be pure functions of their arguments so that a tick
/// can be replayed from recorded timestamps.
pub trait IntensityCurve: Send + Sync {
    /// Intensity in `[0, 1]` for a marker of age `age_ms` under a fade window
    /// of `window_ms`, or `None` once the marker has expired.
    fn intensity(&self, age_ms: u64, window_ms: u64) -> Option<f64>;

    /// Whether a marker of this age is past the window.
    ///
    /// Default implementation delegates to [`intensity`](Self::intensity).
    fn is_expired(&self, age_ms: u64, window_ms: u64) -> bool {
        self.intensity(age_ms, window_ms).is_none()
    }
}
