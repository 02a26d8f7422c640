//! Time spent inside tracked regions.
//!
//! A forward scan over crossing events keeps at most one open entry per
//! tracked region. Time is only ever credited inside
//! `[window_start, last_observed]`: events outside that interval are ignored,
//! and regions still open at the end accrue up to the last real observation,
//! never up to a nominal window end.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crossings::CrossingEvent;
use crate::time::format_hms;

/// Seconds spent per tracked region by one entity in one window.
///
/// Every tracked region has an entry, zero if never visited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDwellAccount {
    pub seconds: BTreeMap<String, i64>,
}

impl RegionDwellAccount {
    /// Seconds credited to `region` (0 if not tracked).
    pub fn seconds(&self, region: &str) -> i64 {
        self.seconds.get(region).copied().unwrap_or(0)
    }

    /// Sum over all tracked regions.
    pub fn total_seconds(&self) -> i64 {
        self.seconds.values().sum()
    }

    /// `"Region: HH:MM:SS"` lines for regions with positive time.
    pub fn readable(&self) -> Vec<String> {
        self.seconds
            .iter()
            .filter(|(_, secs)| **secs > 0)
            .map(|(region, secs)| format!("{}: {}", region, format_hms(*secs)))
            .collect()
    }
}

/// Account time spent inside each tracked region.
///
/// `initial_region` is where the entity was at `window_start`; if tracked,
/// it is open from `window_start`. For each event inside the interval, the
/// `to_region` is opened (if tracked and not already open) and the
/// `from_region` is closed (if tracked and open).
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use region_dwell::{account_region_time, CrossingEvent};
/// use std::collections::BTreeSet;
///
/// let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
/// let cross = |from: &str, to: &str, t| CrossingEvent {
///     from_region: Some(from.into()),
///     to_region: Some(to.into()),
///     timestamp: at(t),
///     latitude: 0.0,
///     longitude: 0.0,
/// };
///
/// let tracked: BTreeSet<String> = ["A".into(), "B".into()].into();
/// let crossings = vec![cross("A", "B", 200), cross("B", "A", 400)];
/// let account = account_region_time(&crossings, at(0), at(450), &tracked, Some("A"));
///
/// assert_eq!(account.seconds("A"), 250);
/// assert_eq!(account.seconds("B"), 200);
/// ```
pub fn account_region_time(
    crossings: &[CrossingEvent],
    window_start: DateTime<Utc>,
    last_observed: DateTime<Utc>,
    tracked: &BTreeSet<String>,
    initial_region: Option<&str>,
) -> RegionDwellAccount {
    let mut open: BTreeMap<&str, Option<DateTime<Utc>>> =
        tracked.iter().map(|r| (r.as_str(), None)).collect();
    let mut seconds: BTreeMap<String, i64> = tracked.iter().map(|r| (r.clone(), 0)).collect();

    let mut credit = |region: &str, from: DateTime<Utc>, to: DateTime<Utc>| {
        if let Some(total) = seconds.get_mut(region) {
            *total += (to - from).num_seconds().max(0);
        }
    };

    if let Some(entry) = initial_region.and_then(|r| open.get_mut(r)) {
        *entry = Some(window_start);
    }

    for event in crossings {
        if event.timestamp < window_start || event.timestamp > last_observed {
            continue;
        }

        if let Some(entry) = event.to_region.as_deref().and_then(|r| open.get_mut(r)) {
            if entry.is_none() {
                *entry = Some(event.timestamp);
            }
        }

        if let Some(region) = event.from_region.as_deref() {
            if let Some(entry) = open.get_mut(region) {
                if let Some(entered) = entry.take() {
                    credit(region, entered, event.timestamp);
                }
            }
        }
    }

    for (region, entry) in open {
        if let Some(entered) = entry {
            credit(region, entered, last_observed);
        }
    }

    RegionDwellAccount { seconds }
}
