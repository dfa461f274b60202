//! # beacon-core
//! Foundation types for the Beacon globe: geo keys, the historical ledger,
//! the bounded live marker set, and the side caches the presentation reads.

pub mod constants;
pub mod detail;
pub mod error;
pub mod history;
pub mod live_set;
pub mod stats;
pub mod traits;
pub mod types;
