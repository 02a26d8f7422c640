//! # Stop Interval Detection
//!
//! Finds sustained low-speed runs in a raw fix stream.
//!
//! ## Algorithm
//! 1. Each fix is "stopped" when `speed <= speed_threshold`
//! 2. A run opens at a stopped fix whose predecessor (if any) was moving
//! 3. The run closes at the first moving fix after it; that fix's timestamp
//!    is the interval end
//! 4. A run still open at the end of data keeps `end_time = None` and is
//!    measured up to its last stopped fix
//! 5. Runs shorter than `min_duration_secs` are discarded
//!
//! Location filtering (e.g. ignoring stops at the home base) is a separate
//! post-processing step, see [`exclude_stops_in_region`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::regions::RegionIndex;
use crate::{Fix, GpsPoint};

/// Configuration for stop detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopConfig {
    /// Fixes at or below this speed count as stopped.
    /// Same unit as [`Fix::speed`]. Default: 1.0
    pub speed_threshold: f64,
    /// Minimum run length to report, in seconds. Default: 900 (15 minutes)
    pub min_duration_secs: i64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            speed_threshold: 1.0,
            min_duration_secs: 900,
        }
    }
}

/// A sustained stationary period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopInterval {
    pub start_time: DateTime<Utc>,
    /// `None` when the entity was still stopped at the end of data.
    pub end_time: Option<DateTime<Utc>>,
    /// Position of the first stopped fix
    pub latitude: f64,
    pub longitude: f64,
    /// Closed runs: `end_time - start_time`. Open runs: time up to the last stopped fix.
    pub duration_secs: i64,
}

impl StopInterval {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Detect stop intervals in time-ordered fixes.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use region_dwell::{detect_stop_intervals, Fix, StopConfig};
///
/// let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
/// let fixes = vec![
///     Fix::new("u", at(0), 0.0, 0.0, 40.0),
///     Fix::new("u", at(60), 0.0, 0.0, 0.0),
///     Fix::new("u", at(1060), 0.0, 0.0, 35.0),
/// ];
///
/// let stops = detect_stop_intervals(&fixes, &StopConfig::default());
/// assert_eq!(stops.len(), 1);
/// assert_eq!(stops[0].duration_secs, 1000);
/// ```
pub fn detect_stop_intervals(fixes: &[Fix], config: &StopConfig) -> Vec<StopInterval> {
    let mut stops = Vec::new();
    // (first stopped fix, last stopped fix) of the run in progress
    let mut run: Option<(&Fix, &Fix)> = None;

    for fix in fixes {
        let stopped = fix.speed <= config.speed_threshold;

        match (run, stopped) {
            (None, true) => run = Some((fix, fix)),
            (Some((start, _)), true) => run = Some((start, fix)),
            (Some((start, _)), false) => {
                let duration_secs = (fix.timestamp - start.timestamp).num_seconds();
                if duration_secs >= config.min_duration_secs {
                    stops.push(StopInterval {
                        start_time: start.timestamp,
                        end_time: Some(fix.timestamp),
                        latitude: start.latitude,
                        longitude: start.longitude,
                        duration_secs,
                    });
                }
                run = None;
            }
            (None, false) => {}
        }
    }

    if let Some((start, last)) = run {
        let duration_secs = (last.timestamp - start.timestamp).num_seconds();
        if duration_secs >= config.min_duration_secs {
            stops.push(StopInterval {
                start_time: start.timestamp,
                end_time: None,
                latitude: start.latitude,
                longitude: start.longitude,
                duration_secs,
            });
        }
    }

    stops
}

/// Drop stops whose starting position lies inside `region`.
pub fn exclude_stops_in_region(
    stops: Vec<StopInterval>,
    index: &RegionIndex,
    region: &str,
) -> Vec<StopInterval> {
    stops
        .into_iter()
        .filter(|stop| index.label(&stop.point()) != Some(region))
        .collect()
}
