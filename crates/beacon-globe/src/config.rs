//! Globe configuration.
//!
//! [`GlobeConfig`] is layered with the `config` crate: built-in defaults, then
//! an optional TOML file, then `BEACON_*` environment variables
//! (e.g. `BEACON_POINT_LIMIT=80`). Loaded values are sanitized rather than
//! rejected: limits below their minimum are clamped up.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use beacon_core::constants::{
    DEFAULT_FADE_WINDOW_SECS, DEFAULT_POINT_LIMIT, HISTORY_CEILING_MS, MIN_FADE_WINDOW_SECS,
    MIN_POINT_LIMIT,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config: {0}")] Load(#[from] config::ConfigError),
    #[error("unknown preset: {0} (expected normal, dense or sparse)")] UnknownPreset(String),
}

/// Runtime settings for a globe instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeConfig {
    /// Maximum number of live markers.
    pub point_limit: usize,
    /// Seconds before a marker fades out.
    pub fade_window_secs: u64,
    /// Seconds a location is remembered after its last sighting.
    pub history_ceiling_secs: u64,
    /// Host frame interval in milliseconds.
    pub frame_interval_ms: u64,
    /// Log level filter string (e.g. "info", "debug", "beacon_globe=trace").
    pub log_level: String,
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            point_limit: DEFAULT_POINT_LIMIT,
            fade_window_secs: DEFAULT_FADE_WINDOW_SECS,
            history_ceiling_secs: HISTORY_CEILING_MS / 1_000,
            frame_interval_ms: 16,
            log_level: "info".to_string(),
        }
    }
}

impl GlobeConfig {
    /// `<config dir>/beacon/globe.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("beacon").join("globe.toml"))
    }

    /// Load defaults, then `path` (if given and present), then `BEACON_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let cfg: GlobeConfig = builder
            .add_source(config::Environment::with_prefix("BEACON").try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(cfg.sanitized())
    }

    /// Clamp every limit to its documented minimum.
    pub fn sanitized(mut self) -> Self {
        self.point_limit = self.point_limit.max(MIN_POINT_LIMIT);
        self.fade_window_secs = self.fade_window_secs.max(MIN_FADE_WINDOW_SECS);
        self.history_ceiling_secs = self.history_ceiling_secs.max(MIN_FADE_WINDOW_SECS);
        self.frame_interval_ms = self.frame_interval_ms.max(1);
        self
    }

    pub fn history_ceiling_ms(&self) -> u64 {
        self.history_ceiling_secs.saturating_mul(1_000)
    }

    /// Copy of this config with a preset's limits applied.
    pub fn with_preset(mut self, preset: Preset) -> Self {
        let (points, fade) = preset.limits();
        self.point_limit = points;
        self.fade_window_secs = fade;
        self
    }
}

/// Named point-limit / fade-window pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// 50 points, 30 s.
    #[default]
    Normal,
    /// 100 points, 60 s.
    Dense,
    /// 25 points, 15 s.
    Sparse,
}

impl Preset {
    /// `(point_limit, fade_window_secs)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use beacon_globe::Preset;
    /// assert_eq!(Preset::Dense.limits(), (100, 60));
    /// ```
    pub fn limits(&self) -> (usize, u64) {
        match self {
            Self::Normal => (50, 30),
            Self::Dense => (100, 60),
            Self::Sparse => (25, 15),
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "dense" => Ok(Self::Dense),
            "sparse" => Ok(Self::Sparse),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Dense => "dense",
            Self::Sparse => "sparse",
        })
    }
}
