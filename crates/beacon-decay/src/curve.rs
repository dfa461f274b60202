//! Linear fade curve.
//!
//! With `max = window_ms` and `start = 0.8 * max`:
//!
//! | age | intensity |
//! |---|---|
//! | `age <= start` | 1 |
//! | `start < age < max` | `1 - (age - start) / (max - start)` |
//! | `age >= max` | expired |

use beacon_core::constants::FADE_START_FRACTION;
use beacon_core::traits::IntensityCurve;

/// Hold, then ramp to zero over the last fifth of the window.
#[derive(Debug, Clone, Copy)]
pub struct LinearFade {
    /// Fraction of the window spent at full intensity.
    fade_start: f64,
}

impl Default for LinearFade {
    fn default() -> Self {
        Self::new(FADE_START_FRACTION)
    }
}

impl LinearFade {
    /// `fade_start` is clamped to `[0, 1)`.
    pub fn new(fade_start: f64) -> Self {
        Self {
            fade_start: fade_start.clamp(0.0, 0.999),
        }
    }

    pub fn fade_start(&self) -> f64 {
        self.fade_start
    }
}

impl IntensityCurve for LinearFade {
    fn intensity(&self, age_ms: u64, window_ms: u64) -> Option<f64> {
        if age_ms >= window_ms {
            return None;
        }
        let max = window_ms as f64;
        let start = max * self.fade_start;
        let age = age_ms as f64;
        if age <= start {
            return Some(1.0);
        }
        let progress = (age - start) / (max - start);
        Some((1.0 - progress).clamp(0.0, 1.0))
    }
}
