//! # Report Assembly
//!
//! Combines labelling, crossings, stops, region time and departure analysis
//! into one record per entity, and runs that over a batch of entities.
//!
//! Entities are independent: the only shared state is the read-only
//! [`RegionIndex`], so batches fan out freely (see `analyze_batch_parallel`).
//! A failure confined to one entity degrades to a "no data" report and never
//! aborts its siblings.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::accounting::{account_region_time, RegionDwellAccount};
use crate::crossings::{detect_crossings, CrossingEvent};
use crate::departure::{analyze_departure, CoverageStatus, DepartureReturnRecord, DepartureState};
use crate::error::{Result, TrackError};
use crate::geo_utils::polyline_length;
use crate::regions::RegionIndex;
use crate::stops::{detect_stop_intervals, exclude_stops_in_region, StopInterval};
use crate::time::{day_windows, AnalysisWindow, TimeZoneConfig};
use crate::trajectory::Trajectory;
use crate::AnalysisConfig;

static NO_REGIONS: BTreeSet<String> = BTreeSet::new();

// ============================================================================
// Roster
// ============================================================================

/// Responsible regions assigned to each entity.
///
/// Deserializes from a JSON object mapping entity id to a list of region names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    assignments: BTreeMap<String, BTreeSet<String>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(entity, region)` rows. Repeated rows collapse.
    ///
    /// # Example
    /// ```
    /// use region_dwell::Roster;
    ///
    /// let roster = Roster::from_pairs([("van-1", "North"), ("van-1", "East"), ("van-1", "North")]);
    /// assert_eq!(roster.responsible_for("van-1").len(), 2);
    /// assert!(roster.responsible_for("van-9").is_empty());
    /// ```
    pub fn from_pairs<I, E, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (E, R)>,
        E: Into<String>,
        R: Into<String>,
    {
        let mut roster = Self::new();
        for (entity, region) in pairs {
            roster.assign(entity, region);
        }
        roster
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn assign(&mut self, entity_id: impl Into<String>, region: impl Into<String>) {
        self.assignments
            .entry(entity_id.into())
            .or_default()
            .insert(region.into());
    }

    /// Regions `entity_id` is expected to visit; empty if unassigned.
    pub fn responsible_for(&self, entity_id: &str) -> &BTreeSet<String> {
        self.assignments.get(entity_id).unwrap_or(&NO_REGIONS)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.assignments.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

// ============================================================================
// Per-entity report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "no data")]
    NoData,
}

/// Everything derived for one entity in one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity_id: String,
    pub status: ReportStatus,
    pub window: AnalysisWindow,
    pub fix_count: usize,
    pub first_fix: Option<DateTime<Utc>>,
    pub last_fix: Option<DateTime<Utc>>,
    /// Haversine length of the analysed track in meters
    pub track_length_meters: f64,
    pub home_region: Option<String>,
    pub crossings: Vec<CrossingEvent>,
    pub stops: Vec<StopInterval>,
    pub region_time: RegionDwellAccount,
    /// `None` for "no data" reports
    pub departure: Option<DepartureReturnRecord>,
}

impl EntityReport {
    /// Sentinel report for an entity without usable fixes.
    pub fn no_data(entity_id: impl Into<String>, window: AnalysisWindow) -> Self {
        Self {
            entity_id: entity_id.into(),
            status: ReportStatus::NoData,
            window,
            fix_count: 0,
            first_fix: None,
            last_fix: None,
            track_length_meters: 0.0,
            home_region: None,
            crossings: Vec::new(),
            stops: Vec::new(),
            region_time: RegionDwellAccount::default(),
            departure: None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.status == ReportStatus::NoData
    }

    pub fn departed(&self) -> bool {
        self.departure.as_ref().is_some_and(|d| d.departed())
    }

    /// Flat, human-readable row with times rendered in the local zone.
    pub fn summary(&self, tz: &TimeZoneConfig) -> EntitySummary {
        let Some(departure) = &self.departure else {
            return EntitySummary {
                entity_id: self.entity_id.clone(),
                status: self.status,
                home_region: None,
                state: None,
                departure_time: None,
                returned_home: false,
                return_time: None,
                first_entries: Vec::new(),
                coverage_comment: "no track data".to_string(),
                region_time: Vec::new(),
            };
        };

        let first_entries = departure
            .first_entry_time_per_responsible_region
            .iter()
            .map(|(region, at)| format!("{}: {}", region, tz.localize(*at).format("%H:%M:%S")))
            .collect();

        EntitySummary {
            entity_id: self.entity_id.clone(),
            status: self.status,
            home_region: self.home_region.clone(),
            state: Some(departure.state()),
            departure_time: departure
                .departure_event
                .as_ref()
                .map(|e| tz.format_local(e.timestamp)),
            returned_home: departure.returned_home,
            return_time: departure
                .return_event
                .as_ref()
                .map(|e| tz.format_local(e.timestamp)),
            first_entries,
            coverage_comment: coverage_comment(departure),
            region_time: self.region_time.readable(),
        }
    }
}

fn join(regions: &BTreeSet<String>) -> String {
    regions.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn coverage_comment(departure: &DepartureReturnRecord) -> String {
    let coverage = &departure.coverage;
    match coverage.status {
        CoverageStatus::NoneAssigned => "no regions assigned".to_string(),
        CoverageStatus::NoneVisited => "no responsible region visited".to_string(),
        CoverageStatus::AllVisited => format!("visited all: {}", join(&coverage.visited)),
        CoverageStatus::Partial => format!(
            "visited: {} | missed: {}",
            join(&coverage.visited),
            join(&coverage.missed)
        ),
    }
}

/// Report row with local-time strings, ready for tabular output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity_id: String,
    pub status: ReportStatus,
    pub home_region: Option<String>,
    pub state: Option<DepartureState>,
    /// `YYYY-MM-DD HH:MM:SS` local
    pub departure_time: Option<String>,
    pub returned_home: bool,
    pub return_time: Option<String>,
    /// `Region: HH:MM:SS` local time of first entry
    pub first_entries: Vec<String>,
    pub coverage_comment: String,
    /// `Region: HH:MM:SS` time spent
    pub region_time: Vec<String>,
}

/// Analyze one entity, degrading any failure to "no data".
///
/// Entity-local failures (see [`TrackError::is_entity_local`]) are logged as
/// warnings. Anything else points at shared input and is logged as an error.
pub fn analyze_entity(
    index: &RegionIndex,
    trajectory: &Trajectory,
    responsible: &BTreeSet<String>,
    window: &AnalysisWindow,
    config: &AnalysisConfig,
) -> EntityReport {
    match try_analyze_entity(index, trajectory, responsible, window, config) {
        Ok(report) => report,
        Err(e) => {
            if e.is_entity_local() {
                warn!("[Report] {}: {}", trajectory.entity_id(), e);
            } else {
                error!("[Report] {}: {}", trajectory.entity_id(), e);
            }
            EntityReport::no_data(trajectory.entity_id(), *window)
        }
    }
}

/// Analyze one entity, returning [`TrackError::NoData`] for an empty window.
///
/// Fixes outside `window` are dropped first. The home region is the region
/// of the first remaining fix, and region time is bounded by the last one.
pub fn try_analyze_entity(
    index: &RegionIndex,
    trajectory: &Trajectory,
    responsible: &BTreeSet<String>,
    window: &AnalysisWindow,
    config: &AnalysisConfig,
) -> Result<EntityReport> {
    let entity_id = trajectory.entity_id();
    let clipped = trajectory.within(window);

    let (first, last) = match (clipped.first(), clipped.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => {
            return Err(TrackError::NoData {
                entity_id: entity_id.to_string(),
            })
        }
    };

    let labeled = clipped.label(index);
    let home = labeled.first().and_then(|l| l.region);
    let crossings = detect_crossings(&labeled)?;

    let mut stops = detect_stop_intervals(clipped.fixes(), &config.stops);
    if config.exclude_home_stops {
        if let Some(home) = home {
            stops = exclude_stops_in_region(stops, index, home);
        }
    }

    let region_time = account_region_time(&crossings, window.start, last, responsible, home);
    let departure = analyze_departure(entity_id, &crossings, home, responsible, window.start);

    debug!(
        "[Report] {}: {} fixes, home {:?}, {} crossings, {} stops, {:?}",
        entity_id,
        clipped.len(),
        home,
        crossings.len(),
        stops.len(),
        departure.state()
    );

    Ok(EntityReport {
        entity_id: entity_id.to_string(),
        status: ReportStatus::Ok,
        window: *window,
        fix_count: clipped.len(),
        first_fix: Some(first),
        last_fix: Some(last),
        track_length_meters: polyline_length(&clipped.points()),
        home_region: home.map(str::to_string),
        crossings,
        stops,
        region_time,
        departure: Some(departure),
    })
}

// ============================================================================
// Batch processing
// ============================================================================

/// Analyze every trajectory against the same window, in input order.
pub fn analyze_batch(
    index: &RegionIndex,
    trajectories: &[Trajectory],
    roster: &Roster,
    window: &AnalysisWindow,
    config: &AnalysisConfig,
) -> Vec<EntityReport> {
    let start = Instant::now();

    let reports: Vec<EntityReport> = trajectories
        .iter()
        .map(|t| analyze_entity(index, t, roster.responsible_for(t.entity_id()), window, config))
        .collect();

    log_batch(&reports, start);
    reports
}

/// Analyze trajectories using parallel processing.
///
/// This is the same as `analyze_batch` but uses rayon for parallel
/// processing. Output order matches input order.
#[cfg(feature = "parallel")]
pub fn analyze_batch_parallel(
    index: &RegionIndex,
    trajectories: &[Trajectory],
    roster: &Roster,
    window: &AnalysisWindow,
    config: &AnalysisConfig,
) -> Vec<EntityReport> {
    use rayon::prelude::*;

    let start = Instant::now();

    let reports: Vec<EntityReport> = trajectories
        .par_iter()
        .map(|t| analyze_entity(index, t, roster.responsible_for(t.entity_id()), window, config))
        .collect();

    log_batch(&reports, start);
    reports
}

fn log_batch(reports: &[EntityReport], start: Instant) {
    let no_data = reports.iter().filter(|r| r.is_no_data()).count();
    info!(
        "[Report] Analyzed {} entities ({} without data) in {:?}",
        reports.len(),
        no_data,
        start.elapsed()
    );
}

/// One local day of reports, split the way dispatchers read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub window: AnalysisWindow,
    pub departed: Vec<EntityReport>,
    pub not_departed: Vec<EntityReport>,
    pub no_data: Vec<EntityReport>,
}

impl DailyReport {
    pub fn partition(date: NaiveDate, window: AnalysisWindow, reports: Vec<EntityReport>) -> Self {
        let mut daily = Self {
            date,
            window,
            departed: Vec::new(),
            not_departed: Vec::new(),
            no_data: Vec::new(),
        };

        for report in reports {
            if report.is_no_data() {
                daily.no_data.push(report);
            } else if report.departed() {
                daily.departed.push(report);
            } else {
                daily.not_departed.push(report);
            }
        }

        daily
    }

    pub fn len(&self) -> usize {
        self.departed.len() + self.not_departed.len() + self.no_data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run a batch for every local calendar day from `from` to `to` inclusive.
pub fn analyze_days(
    index: &RegionIndex,
    trajectories: &[Trajectory],
    roster: &Roster,
    from: NaiveDate,
    to: NaiveDate,
    config: &AnalysisConfig,
) -> Vec<DailyReport> {
    day_windows(from, to, &config.time_zone)
        .into_iter()
        .zip(from.iter_days())
        .map(|(window, date)| {
            #[cfg(feature = "parallel")]
            let reports = analyze_batch_parallel(index, trajectories, roster, &window, config);
            #[cfg(not(feature = "parallel"))]
            let reports = analyze_batch(index, trajectories, roster, &window, config);

            let daily = DailyReport::partition(date, window, reports);
            info!(
                "[Report] {}: {} departed, {} stayed, {} without data",
                date,
                daily.departed.len(),
                daily.not_departed.len(),
                daily.no_data.len()
            );
            daily
        })
        .collect()
}
