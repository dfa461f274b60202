//! beacon-feed: drives a globe from a package feed.
//!
//! Reads JSON lines (packages or control messages) from stdin or from the
//! given input files, one source after another, and writes the resulting
//! marker commands to stdout as JSON lines. A frame-interval timer runs the
//! decay pass. With `--replay` it instead ingests a `/history` dump on the
//! records' own clock and prints the final snapshot and statistics.
//!
//! Logs go to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use beacon_core::types::{GeoKey, MarkerCommand};
use beacon_globe::{GlobeConfig, GlobeState, Preset};
use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, info, warn};

mod feed;

use feed::{Control, FeedLine, PackageFilter, PackageRecord};

#[derive(Parser, Debug)]
#[command(name = "beacon-feed", version, about = "Live package globe driven by a JSON-lines feed")]
struct Args {
    /// Config file (TOML); defaults to <config dir>/beacon/globe.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of live markers
    #[arg(long)]
    point_limit: Option<usize>,

    /// Seconds before a marker fades out
    #[arg(long)]
    fade_window: Option<u64>,

    /// normal, dense or sparse; explicit limits override it
    #[arg(long)]
    preset: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Replay a JSON array of package records and exit
    #[arg(long, conflicts_with = "input")]
    replay: Option<PathBuf>,

    /// Input files read in order; stdin when none are given
    #[arg(long)]
    input: Vec<PathBuf>,
}

impl Args {
    /// Layer CLI flags over the loaded config.
    fn into_config(self) -> Result<(GlobeConfig, Self)> {
        let path = self.config.clone().or_else(GlobeConfig::default_path);
        let mut config = GlobeConfig::load(path.as_deref()).context("failed to load globe config")?;

        if let Some(preset) = &self.preset {
            let preset: Preset = preset.parse()?;
            config = config.with_preset(preset);
        }
        if let Some(n) = self.point_limit {
            config.point_limit = n;
        }
        if let Some(secs) = self.fade_window {
            config.fade_window_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok((config.sanitized(), self))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let (config, args) = Args::parse().into_config()?;
    init_logging(&config.log_level, &args.log_format);

    info!(
        point_limit = config.point_limit,
        fade_window_secs = config.fade_window_secs,
        history_ceiling_secs = config.history_ceiling_secs,
        "beacon-feed v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut globe = GlobeState::new(&config);
    if let Some(path) = &args.replay {
        return replay(&mut globe, path);
    }

    let mut out = Output::stdout();
    let mut filter = PackageFilter::new();
    let frame = Duration::from_millis(config.frame_interval_ms);

    if args.input.is_empty() {
        run_source(&mut globe, &mut filter, &mut out, tokio::io::stdin(), frame).await?;
    } else {
        for path in &args.input {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            info!(source = %path.display(), "feed: reading source");
            filter.clear();
            if !run_source(&mut globe, &mut filter, &mut out, file, frame).await? {
                break;
            }
        }
    }

    info!(live = globe.live().len(), history = globe.history().len(), "beacon-feed shutdown complete");
    Ok(())
}

/// Pump one source until EOF or Ctrl+C. Returns `false` on Ctrl+C.
async fn run_source<R>(
    globe: &mut GlobeState,
    filter: &mut PackageFilter,
    out: &mut Output,
    source: R,
    frame: Duration,
) -> Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(source).lines();
    let mut ticker = tokio::time::interval(frame);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read feed")? else {
                    debug!("feed: source exhausted");
                    return Ok(true);
                };
                handle_line(globe, filter, out, &line, wall_clock_ms())?;
            }
            _ = ticker.tick() => {
                out.commands(&globe.tick(wall_clock_ms()))?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, shutting down");
                return Ok(false);
            }
        }
    }
}

fn handle_line(
    globe: &mut GlobeState,
    filter: &mut PackageFilter,
    out: &mut Output,
    line: &str,
    now: u64,
) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    match feed::parse_line(line) {
        Ok(FeedLine::Package(record)) => ingest(globe, filter, out, record, now),
        Ok(FeedLine::Control(control)) => apply_control(globe, out, control, now),
        Err(e) => {
            warn!(error = %e, "feed: skipping malformed line");
            Ok(())
        }
    }
}

fn ingest(
    globe: &mut GlobeState,
    filter: &mut PackageFilter,
    out: &mut Output,
    record: PackageRecord,
    now: u64,
) -> Result<()> {
    if !filter.admit(&record) {
        debug!(key = %record.dedup_key(), "feed: duplicate package dropped");
        return Ok(());
    }
    match globe.ingest(record.into_event(), now) {
        Ok(commands) => out.commands(&commands),
        Err(e) => {
            warn!(error = %e, "feed: package rejected");
            Ok(())
        }
    }
}

fn apply_control(globe: &mut GlobeState, out: &mut Output, control: Control, now: u64) -> Result<()> {
    match control {
        Control::PointLimit { value } => out.commands(&globe.set_capacity(value)),
        Control::FadeWindow { value } => out.commands(&globe.set_fade_window(value, now)),
        Control::Preset { value } => match value.parse::<Preset>() {
            Ok(preset) => out.commands(&globe.apply_preset(preset, now)),
            Err(e) => {
                warn!(error = %e, "feed: ignoring preset");
                Ok(())
            }
        },
        Control::Stats => out.value(&Report::Stats(globe.stats(now))),
        Control::Describe { latitude, longitude } => {
            let detail = GeoKey::from_coords(latitude, longitude)
                .ok()
                .and_then(|k| globe.describe(&k));
            out.value(&Report::Describe(detail))
        }
    }
}

/// Ingest a `/history` dump in timestamp order, using the records' own clock.
fn replay(globe: &mut GlobeState, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut records: Vec<PackageRecord> =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a package array", path.display()))?;
    records.sort_by_key(|r| r.sent_at_ms().unwrap_or(0));
    info!(records = records.len(), "replay: starting");

    let mut out = Output::stdout();
    let mut filter = PackageFilter::new();
    let mut clock = 0;
    for record in records {
        clock = record.sent_at_ms().unwrap_or(clock).max(clock);
        out.commands(&globe.tick(clock))?;
        ingest(globe, &mut filter, &mut out, record, clock)?;
    }
    out.commands(&globe.tick(clock))?;

    out.value(&Report::Snapshot(globe.snapshot().collect()))?;
    out.value(&Report::Stats(globe.stats(clock)))?;
    info!(live = globe.live().len(), history = globe.history().len(), "replay: done");
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Report<'a> {
    Stats(beacon_core::stats::StatsSummary),
    Describe(Option<beacon_globe::MarkerDetail>),
    Snapshot(Vec<&'a beacon_core::types::LiveMarker>),
}

/// JSON-lines writer over stdout.
struct Output {
    inner: std::io::Stdout,
}

impl Output {
    fn stdout() -> Self {
        Self {
            inner: std::io::stdout(),
        }
    }

    fn commands(&mut self, commands: &[MarkerCommand]) -> Result<()> {
        for command in commands {
            self.value(command)?;
        }
        Ok(())
    }

    fn value<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let mut lock = self.inner.lock();
        serde_json::to_writer(&mut lock, value)?;
        lock.write_all(b"\n")?;
        lock.flush()?;
        Ok(())
    }
}

fn wall_clock_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text. Both write to stderr.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
