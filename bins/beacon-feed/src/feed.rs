//! Wire format of the package feed and per-package deduplication.
//!
//! Each input line is either a package record or a control message. Package
//! records look like
//! `{"ip": "..", "latitude": .., "longitude": .., "timestamp": "..", "suspicious": 0, "packege_id": 7}`;
//! `suspicious` may be `0`/`1` or a bool, `timestamp` is ISO 8601 with or
//! without an offset (naive timestamps are taken as UTC), and any other field
//! is kept as opaque metadata.

use std::collections::{BTreeMap, HashSet};

use beacon_core::constants::{MIN_FADE_WINDOW_SECS, MIN_POINT_LIMIT, UNKNOWN_IP};
use beacon_core::types::{EventRecord, PackageMeta};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// One package as it arrives on the feed.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PackageRecord {
    #[serde(default)]
    pub ip: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub suspicious: bool,
    #[serde(default, rename = "packege_id", alias = "package_id")]
    pub package_id: Option<u64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Flag::deserialize(d)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Text(s) => matches!(s.trim(), "1" | "true" | "True"),
    })
}

impl PackageRecord {
    /// Parsed send time, if the record carries a readable one.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?.trim();
        if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
            return Some(t.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|t| t.and_utc())
    }

    /// Send time in epoch milliseconds; pre-epoch times clamp to zero.
    pub fn sent_at_ms(&self) -> Option<u64> {
        self.sent_at().map(|t| t.timestamp_millis().max(0) as u64)
    }

    /// `ip-latitude-longitude-timestamp`, the identity used for dedup.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.ip.as_deref().unwrap_or(UNKNOWN_IP),
            self.latitude,
            self.longitude,
            self.timestamp.as_deref().unwrap_or("")
        )
    }

    pub fn into_event(self) -> EventRecord {
        let sent_at = self.sent_at();
        let meta = PackageMeta {
            ip: self.ip.unwrap_or_else(|| UNKNOWN_IP.to_string()),
            package_id: self.package_id,
            sent_at,
            extra: self.extra,
        };
        EventRecord::new(self.latitude, self.longitude, self.suspicious).with_meta(meta)
    }
}

/// Runtime requests accepted on the same stream as packages.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum Control {
    PointLimit {
        #[serde(deserialize_with = "point_limit")]
        value: usize,
    },
    FadeWindow {
        #[serde(deserialize_with = "fade_window")]
        value: u64,
    },
    Preset { value: String },
    Stats,
    Describe { latitude: f64, longitude: f64 },
}

// Any number is accepted, rounded, and clamped up to the minimum.
fn point_limit<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    let v = f64::deserialize(d)?.round();
    Ok((v as usize).max(MIN_POINT_LIMIT))
}

fn fade_window<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let v = f64::deserialize(d)?.round();
    Ok((v as u64).max(MIN_FADE_WINDOW_SECS))
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FeedLine {
    Control(Control),
    Package(PackageRecord),
}

pub fn parse_line(line: &str) -> Result<FeedLine, serde_json::Error> {
    serde_json::from_str(line)
}

/// Drops packages already seen on the current input source.
#[derive(Debug, Default)]
pub struct PackageFilter {
    seen: HashSet<String>,
}

impl PackageFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` the first time a package is offered, `false` for repeats.
    pub fn admit(&mut self, record: &PackageRecord) -> bool {
        self.seen.insert(record.dedup_key())
    }

    /// Forget every key; called when the input source changes.
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
