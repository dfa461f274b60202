//! Aggregate package statistics shown next to the globe.
//!
//! Counts every accepted event (not just live markers):
//! - totals and suspicious totals
//! - distinct sender IPs overall and per location
//! - the busiest location, bucketed at two decimals
//! - a trailing-minute rate
//!
//! The rate uses a sliding window of arrival times: each query first prunes
//! arrivals older than [`RATE_WINDOW_MS`], then averages what is left over
//! the window length.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::constants::RATE_WINDOW_MS;
use crate::types::EventRecord;

#[derive(Debug, Clone, Default)]
struct LocationTally {
    count: u64,
    /// Distinct IPs in first-seen order.
    ips: Vec<String>,
    seen_ips: HashSet<String>,
    /// Position in first-seen order across locations, for tie-breaks.
    order: u64,
}

/// The busiest location so far.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TopLocation {
    /// `"lat,lon"` at two decimals.
    pub location: String,
    pub count: u64,
    pub distinct_ips: usize,
    /// Most recently first-seen IP at this location.
    pub latest_ip: String,
}

/// Point-in-time view of the board.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct StatsSummary {
    pub total_packages: u64,
    pub suspicious_packages: u64,
    pub unique_ips: usize,
    pub top_location: Option<TopLocation>,
    /// Packages per second averaged over the last minute, one decimal.
    pub recent_rate: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StatsBoard {
    total: u64,
    suspicious: u64,
    unique_ips: HashSet<String>,
    locations: HashMap<String, LocationTally>,
    recent: VecDeque<u64>,
}

/// Two-decimal location bucket used by the board.
pub fn location_bucket(lat: f64, lon: f64) -> String {
    format!("{lat:.2},{lon:.2}")
}

impl StatsBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one accepted event arriving at `now`.
    pub fn record(&mut self, event: &EventRecord, now: u64) {
        self.total += 1;
        if event.suspicious {
            self.suspicious += 1;
        }

        let ip = event.ip();
        if !self.unique_ips.contains(ip) {
            self.unique_ips.insert(ip.to_string());
        }

        let next_order = self.locations.len() as u64;
        let tally = self
            .locations
            .entry(location_bucket(event.latitude, event.longitude))
            .or_insert_with(|| LocationTally {
                order: next_order,
                ..LocationTally::default()
            });
        tally.count += 1;
        if tally.seen_ips.insert(ip.to_string()) {
            tally.ips.push(ip.to_string());
        }

        self.recent.push_back(now);
    }

    fn prune(&mut self, now: u64) {
        let Some(cutoff) = now.checked_sub(RATE_WINDOW_MS) else {
            return;
        };
        while self.recent.front().is_some_and(|t| *t <= cutoff) {
            self.recent.pop_front();
        }
    }

    /// Packages per second over the trailing minute, rounded to one decimal.
    pub fn recent_rate(&mut self, now: u64) -> f64 {
        self.prune(now);
        let per_sec = self.recent.len() as f64 / (RATE_WINDOW_MS as f64 / 1_000.0);
        (per_sec * 10.0).round() / 10.0
    }

    /// Busiest location; ties go to the location seen first.
    pub fn top_location(&self) -> Option<TopLocation> {
        self.locations
            .iter()
            .max_by(|(_, a), (_, b)| a.count.cmp(&b.count).then(b.order.cmp(&a.order)))
            .map(|(location, tally)| TopLocation {
                location: location.clone(),
                count: tally.count,
                distinct_ips: tally.ips.len(),
                latest_ip: tally.ips.last().cloned().unwrap_or_default(),
            })
    }

    pub fn summary(&mut self, now: u64) -> StatsSummary {
        StatsSummary {
            total_packages: self.total,
            suspicious_packages: self.suspicious,
            unique_ips: self.unique_ips.len(),
            top_location: self.top_location(),
            recent_rate: self.recent_rate(now),
        }
    }

    pub fn total_packages(&self) -> u64 {
        self.total
    }

    pub fn suspicious_packages(&self) -> u64 {
        self.suspicious
    }

    pub fn unique_ips(&self) -> usize {
        self.unique_ips.len()
    }
}
