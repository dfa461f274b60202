//! Cross-crate test suite for the Beacon globe.
//!
//! Scenario tests drive a [`beacon_globe::GlobeState`] through the ingest,
//! decay and retention paths on an explicit millisecond clock. Property
//! tests check the bounds that must hold for any event sequence.

pub mod helpers;
