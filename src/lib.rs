//! # Region Dwell
//!
//! Region crossing detection and dwell-time accounting for GPS fleet tracks.
//!
//! This library provides:
//! - Point-in-region labelling backed by an R-tree over region bounding boxes
//! - Region crossing events from labelled trajectories
//! - Stop intervals from low-speed runs in raw fixes
//! - Dwell pairing between consecutive trips ending/starting at the same place
//! - Time spent inside a roster of responsible regions
//! - Home-region departure / return analysis
//! - Per-entity report assembly with parallel batch processing
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel batch processing with rayon
//! - **`cli`** - Build the `region-report` command line tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use region_dwell::{
//!     AnalysisConfig, AnalysisWindow, Bounds, Fix, Region, RegionIndex, Trajectory,
//!     analyze_entity,
//! };
//! use std::collections::BTreeSet;
//!
//! let index = RegionIndex::build(vec![
//!     Region::rectangle("Home", Bounds { min_lat: 0.0, max_lat: 1.0, min_lng: 0.0, max_lng: 1.0 }),
//!     Region::rectangle("Work", Bounds { min_lat: 0.0, max_lat: 1.0, min_lng: 1.0, max_lng: 2.0 }),
//! ]).unwrap();
//!
//! let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
//! let trajectory = Trajectory::new("unit-1", vec![
//!     Fix::new("unit-1", at(0), 0.5, 0.5, 0.0),
//!     Fix::new("unit-1", at(600), 0.5, 1.5, 30.0),
//!     Fix::new("unit-1", at(1200), 0.5, 0.5, 0.0),
//! ]);
//!
//! let window = AnalysisWindow::new(at(0), at(3600));
//! let responsible: BTreeSet<String> = ["Work".to_string()].into();
//! let report = analyze_entity(&index, &trajectory, &responsible, &window, &AnalysisConfig::default());
//!
//! assert_eq!(report.crossings.len(), 2);
//! assert!(report.departure.as_ref().unwrap().returned_home);
//! assert_eq!(report.region_time.seconds("Work"), 600);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrackError};

// Analysis windows and the local time zone conversion
pub mod time;
pub use time::{day_windows, AnalysisWindow, TimeZoneConfig};

// Geographic utilities (distances, track length)
pub mod geo_utils;

// Region polygons and the point-in-region index
pub mod regions;
pub use regions::{Region, RegionIndex};

// Fix ingestion and region labelling
pub mod trajectory;
pub use trajectory::{label_fixes, LabeledFix, RawFix, TimeValue, Trajectory};

// Region crossing events
pub mod crossings;
pub use crossings::{detect_crossings, reconstruct_labels, CrossingEvent};

// Low-speed stop intervals
pub mod stops;
pub use stops::{detect_stop_intervals, exclude_stops_in_region, StopConfig, StopInterval};

// Trip-gap dwell pairing
pub mod dwell;
pub use dwell::{
    aggregate_dwell, dwell_by_location, filter_trips, DwellConfig, DwellRecord, LocationDwell,
    TripSegment,
};

// Dwell heat map
pub mod heatmap;
pub use heatmap::{
    generate_dwell_heatmap, query_heatmap_cell, HeatmapCell, HeatmapConfig, HeatmapResult,
};

// Time spent inside tracked regions
pub mod accounting;
pub use accounting::{account_region_time, RegionDwellAccount};

// Home region departure and return
pub mod departure;
pub use departure::{
    analyze_departure, Coverage, CoverageStatus, DepartureReturnRecord, DepartureState,
};

// Per-entity report assembly and batch orchestration
pub mod report;
#[cfg(feature = "parallel")]
pub use report::analyze_batch_parallel;
pub use report::{
    analyze_batch, analyze_days, analyze_entity, try_analyze_entity, DailyReport, EntityReport,
    EntitySummary, ReportStatus, Roster,
};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use region_dwell::GpsPoint;
/// let point = GpsPoint::new(51.1282, 71.4304); // Astana
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self { min_lat, max_lat, min_lng, max_lng })
    }

    /// Whether the point lies inside (or on the edge of) the bounds.
    pub fn contains(&self, point: &GpsPoint) -> bool {
        point.latitude >= self.min_lat
            && point.latitude <= self.max_lat
            && point.longitude >= self.min_lng
            && point.longitude <= self.max_lng
    }
}

/// One timestamped position and speed sample for an entity.
///
/// Speed is unit-agnostic; it only has to agree with
/// [`StopConfig::speed_threshold`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
}

impl Fix {
    pub fn new(
        entity_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        speed: f64,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp,
            latitude,
            longitude,
            speed,
        }
    }

    /// Position of this fix.
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }
}

/// Configuration for a full per-entity analysis.
///
/// Deserializes from partial JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Stop interval detection parameters
    pub stops: StopConfig,
    /// Trip-gap dwell pairing parameters
    pub dwell: DwellConfig,
    /// Local time zone for day windows and rendered times
    pub time_zone: TimeZoneConfig,
    /// Drop stops that lie inside the entity's home region.
    /// Default: true
    pub exclude_home_stops: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stops: StopConfig::default(),
            dwell: DwellConfig::default(),
            time_zone: TimeZoneConfig::default(),
            exclude_home_stops: true,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(51.1282, 71.4304).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_bounds_from_points() {
        assert!(Bounds::from_points(&[]).is_none());
        let bounds = Bounds::from_points(&[
            GpsPoint::new(51.50, -0.13),
            GpsPoint::new(51.51, -0.12),
        ])
        .unwrap();
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lng, -0.12);
        assert!(bounds.contains(&GpsPoint::new(51.505, -0.125)));
    }

    #[test]
    fn test_config_partial_json() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"stops": {"speed_threshold": 3.0}}"#).unwrap();
        assert_eq!(config.stops.speed_threshold, 3.0);
        assert_eq!(config.stops.min_duration_secs, 900);
        assert!(config.exclude_home_stops);
        assert_eq!(config.time_zone.utc_offset_seconds, 18_000);
    }
}
