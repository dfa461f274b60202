//! Error types for the Beacon core.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("non-finite coordinate: lat={lat}, lon={lon}")] NonFinite { lat: f64, lon: f64 },
    #[error("latitude out of range: {0}")] LatitudeOutOfRange(f64),
    #[error("longitude out of range: {0}")] LongitudeOutOfRange(f64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiveSetError {
    #[error("queue/map desync: {queued} queued, {mapped} mapped")] Desync { queued: usize, mapped: usize },
    #[error("queued key has no marker: {0}")] Orphan(String),
    #[error("key queued twice: {0}")] Duplicate(String),
    #[error("size {len} exceeds capacity {capacity}")] OverCapacity { len: usize, capacity: usize },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlobeError {
    #[error(transparent)] Geo(#[from] GeoError),
    #[error(transparent)] LiveSet(#[from] LiveSetError),
    #[error("live key missing from history: {0}")] LedgerGap(String),
}
