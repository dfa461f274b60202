//! # beacon-globe
//! Composes the Beacon core into a single-writer [`GlobeState`]: event
//! ingest, decay ticks, retention-window changes and detail lookups.

pub mod config;
pub mod ingest;
pub mod retention;
pub mod state;

pub use config::{ConfigError, GlobeConfig, Preset};
pub use retention::RetentionController;
pub use state::{GlobeState, MarkerDetail};
