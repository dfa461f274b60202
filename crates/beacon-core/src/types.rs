//! Core types: geo keys, event records, ledger points, live markers and the
//! commands handed to the presentation layer.
//!
//! Timestamps are `u64` milliseconds supplied by the caller. Coordinates are
//! degrees.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::constants::{
    BEAM_HEIGHT_MAX, BEAM_HEIGHT_PER_HIT, BEAM_OPACITY_BASE, BEAM_OPACITY_MAX,
    BEAM_OPACITY_PER_HIT, GEO_KEY_SCALE,
};
use crate::error::GeoError;

/// Identity of a location: latitude and longitude rounded to four decimals.
///
/// Stored as fixed-point integers so equality and hashing are exact. Two
/// events whose coordinates round to the same four decimals share a key.
///
/// # Examples
///
/// ```
/// use beacon_core::types::GeoKey;
/// let a = GeoKey::from_coords(10.0, 20.0).unwrap();
/// let b = GeoKey::from_coords(10.00001, 20.00001).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "10.0000,20.0000");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeoKey {
    lat_e4: i32,
    lon_e4: i32,
}

impl GeoKey {
    /// Derive the key for a coordinate pair.
    ///
    /// Rejects NaN/infinite input and coordinates outside the valid
    /// latitude/longitude ranges instead of storing garbage.
    pub fn from_coords(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(GeoError::NonFinite { lat, lon });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(GeoError::LongitudeOutOfRange(lon));
        }
        Ok(Self {
            lat_e4: fixed_e4(lat),
            lon_e4: fixed_e4(lon),
        })
    }

    /// Rounded latitude in degrees.
    pub fn lat(&self) -> f64 {
        self.lat_e4 as f64 / GEO_KEY_SCALE
    }

    /// Rounded longitude in degrees.
    pub fn lon(&self) -> f64 {
        self.lon_e4 as f64 / GEO_KEY_SCALE
    }
}

/// Round `x` to four decimals from its exact binary value, ties away from
/// zero. A plain `(x * 1e4).round()` rounds the already-rounded product and
/// can land on the wrong side of a half (`51.50745` is stored just below
/// `51.50745` but multiplies to exactly `515074.5`).
///
/// `x` must be finite with `|x| <= 180`.
fn fixed_e4(x: f64) -> i32 {
    let a = x.abs();
    let t = a * GEO_KEY_SCALE;
    // Exact rounding error of the product: a * 1e4 == t + err.
    let err = a.mul_add(GEO_KEY_SCALE, -t);
    let n = t.floor();
    // Sign of (exact - (n + 0.5)); `t - n - 0.5` is exact at this magnitude.
    let above_half = (t - n - 0.5) + err >= 0.0;
    let units = (if above_half { n + 1.0 } else { n }) as i32;
    if x < 0.0 { -units } else { units }
}

impl fmt::Display for GeoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat(), self.lon())
    }
}

impl Serialize for GeoKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which rendered variant a marker uses. Suspicious is sticky: once a
/// location has been seen suspicious its live marker never reverts.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum MarkerVariant {
    #[default]
    Benign,
    Suspicious,
}

impl MarkerVariant {
    pub fn from_flag(suspicious: bool) -> Self {
        if suspicious { Self::Suspicious } else { Self::Benign }
    }

    pub fn is_suspicious(&self) -> bool {
        matches!(self, Self::Suspicious)
    }
}

/// Hit-count driven beam proxies. Both saturate as repetitions grow.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct Visual {
    /// Beam height multiplier, `min(1 + 0.3 * hits, 4)`.
    pub height_scale: f64,
    /// Beam base opacity, `min(0.4 + 0.01 * hits, 0.5)`.
    pub beam_opacity: f64,
}

impl Visual {
    /// Visual proxies for a marker that has been hit `hits` times.
    ///
    /// # Examples
    ///
    /// ```
    /// use beacon_core::types::Visual;
    /// let v = Visual::for_hits(100);
    /// assert_eq!(v.height_scale, 4.0);
    /// assert_eq!(v.beam_opacity, 0.5);
    /// ```
    pub fn for_hits(hits: u64) -> Self {
        let h = hits as f64;
        Self {
            height_scale: (1.0 + BEAM_HEIGHT_PER_HIT * h).min(BEAM_HEIGHT_MAX),
            beam_opacity: (BEAM_OPACITY_BASE + BEAM_OPACITY_PER_HIT * h).min(BEAM_OPACITY_MAX),
        }
    }
}

/// Opaque per-package metadata carried alongside an event. Only used for
/// detail lookups and statistics; never for marker logic.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct PackageMeta {
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    /// Anything else the transport attached.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A normalized, already-parsed event handed to the ingest path.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub suspicious: bool,
    pub meta: Option<PackageMeta>,
}

impl EventRecord {
    pub fn new(latitude: f64, longitude: f64, suspicious: bool) -> Self {
        Self {
            latitude,
            longitude,
            suspicious,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: PackageMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// IP of the sender, or [`UNKNOWN_IP`](crate::constants::UNKNOWN_IP).
    pub fn ip(&self) -> &str {
        self.meta
            .as_ref()
            .map(|m| m.ip.as_str())
            .unwrap_or(crate::constants::UNKNOWN_IP)
    }
}

/// Every location ever seen, kept until it ages past the history ceiling.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct HistoricalPoint {
    pub key: GeoKey,
    /// Coordinates of the first sighting.
    pub lat: f64,
    pub lon: f64,
    /// Number of sightings, always at least 1.
    pub hits: u64,
    pub last_seen_at: u64,
    /// OR of every sighting's suspicious flag.
    pub suspicious_ever: bool,
}

/// A currently displayed marker, owned by the [`LiveSet`](crate::live_set::LiveSet).
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct LiveMarker {
    pub key: GeoKey,
    pub lat: f64,
    pub lon: f64,
    pub hits: u64,
    /// Admission or last refresh time; the decay clock starts here.
    pub refreshed_at: u64,
    pub variant: MarkerVariant,
    /// Decay-derived presentation intensity in `[0, 1]`.
    pub intensity: f64,
    #[serde(skip)]
    pub(crate) admitted_seq: u64,
}

impl LiveMarker {
    pub fn visual(&self) -> Visual {
        Visual::for_hits(self.hits)
    }

    pub fn is_suspicious(&self) -> bool {
        self.variant.is_suspicious()
    }

    /// Age relative to `now`, saturating at zero for out-of-order clocks.
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.refreshed_at)
    }

    pub fn create_command(&self) -> MarkerCommand {
        MarkerCommand::Create {
            key: self.key,
            lat: self.lat,
            lon: self.lon,
            variant: self.variant,
            intensity: self.intensity,
            visual: self.visual(),
        }
    }

    pub fn update_command(&self) -> MarkerCommand {
        MarkerCommand::Update {
            key: self.key,
            variant: self.variant,
            intensity: self.intensity,
            visual: self.visual(),
        }
    }

    pub fn replace_command(&self) -> MarkerCommand {
        MarkerCommand::Replace {
            key: self.key,
            lat: self.lat,
            lon: self.lon,
            variant: self.variant,
            intensity: self.intensity,
            visual: self.visual(),
        }
    }
}

/// Why a marker left the live set.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvictReason {
    /// Oldest admission pushed out by the point limit.
    Capacity,
    /// Aged past the fade window.
    Expired,
}

/// Lifecycle instruction for the presentation layer.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MarkerCommand {
    Create {
        key: GeoKey,
        lat: f64,
        lon: f64,
        variant: MarkerVariant,
        intensity: f64,
        visual: Visual,
    },
    Update {
        key: GeoKey,
        variant: MarkerVariant,
        intensity: f64,
        visual: Visual,
    },
    /// Swap the rendered group for a different variant at the same place.
    Replace {
        key: GeoKey,
        lat: f64,
        lon: f64,
        variant: MarkerVariant,
        intensity: f64,
        visual: Visual,
    },
    Evict {
        key: GeoKey,
        reason: EvictReason,
    },
}

impl MarkerCommand {
    pub fn key(&self) -> &GeoKey {
        match self {
            Self::Create { key, .. }
            | Self::Update { key, .. }
            | Self::Replace { key, .. }
            | Self::Evict { key, .. } => key,
        }
    }

    pub fn is_evict(&self) -> bool {
        matches!(self, Self::Evict { .. })
    }
}
