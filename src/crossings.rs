//! Region crossing detection.
//!
//! A crossing is emitted every time the region label changes between two
//! time-adjacent fixes. Leaving every region (label `None`) and coming back
//! are crossings like any other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::trajectory::LabeledFix;

/// A change of region between two time-adjacent fixes of one entity.
///
/// `from_region != to_region` always holds. Position and timestamp are those
/// of the later fix (the first one observed in `to_region`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossingEvent {
    pub from_region: Option<String>,
    pub to_region: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl CrossingEvent {
    /// Whether this crossing leaves `region`.
    pub fn leaves(&self, region: Option<&str>) -> bool {
        self.from_region.as_deref() == region
    }

    /// Whether this crossing enters `region`.
    pub fn enters(&self, region: Option<&str>) -> bool {
        self.to_region.as_deref() == region
    }
}

/// Scan a labelled sequence and emit one event per region change.
///
/// The first sample sets the current region without emitting anything, so
/// empty and single-sample sequences yield no events.
///
/// # Errors
/// [`TrackError::UnsortedInput`] if timestamps are not strictly increasing.
/// [`crate::Trajectory`] always produces a valid ordering.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use region_dwell::{detect_crossings, Fix, LabeledFix};
///
/// let fixes: Vec<Fix> = (0..3)
///     .map(|i| Fix::new("u", Utc.timestamp_opt(i * 60, 0).unwrap(), 0.0, 0.0, 0.0))
///     .collect();
/// let labeled = vec![
///     LabeledFix { fix: &fixes[0], region: Some("A") },
///     LabeledFix { fix: &fixes[1], region: Some("A") },
///     LabeledFix { fix: &fixes[2], region: None },
/// ];
///
/// let events = detect_crossings(&labeled).unwrap();
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].from_region.as_deref(), Some("A"));
/// assert_eq!(events[0].to_region, None);
/// ```
pub fn detect_crossings(labeled: &[LabeledFix<'_>]) -> Result<Vec<CrossingEvent>> {
    let Some(first) = labeled.first() else {
        return Ok(Vec::new());
    };

    let mut events = Vec::new();
    let mut current = first.region;
    let mut previous_time = first.fix.timestamp;

    for (index, sample) in labeled.iter().enumerate().skip(1) {
        if sample.fix.timestamp <= previous_time {
            return Err(TrackError::UnsortedInput { index });
        }
        previous_time = sample.fix.timestamp;

        if sample.region != current {
            events.push(CrossingEvent {
                from_region: current.map(str::to_string),
                to_region: sample.region.map(str::to_string),
                timestamp: sample.fix.timestamp,
                latitude: sample.fix.latitude,
                longitude: sample.fix.longitude,
            });
            current = sample.region;
        }
    }

    Ok(events)
}

/// Replay crossings against an initial region to recover a label per timestamp.
///
/// `timestamps` must be sorted. Each timestamp gets the label in force at that
/// instant: the `to_region` of the latest crossing at or before it, or
/// `initial` if none.
pub fn reconstruct_labels(
    initial: Option<&str>,
    crossings: &[CrossingEvent],
    timestamps: &[DateTime<Utc>],
) -> Vec<Option<String>> {
    let mut current = initial.map(str::to_string);
    let mut pending = crossings.iter().peekable();

    timestamps
        .iter()
        .map(|ts| {
            while let Some(event) = pending.next_if(|e| e.timestamp <= *ts) {
                current = event.to_region.clone();
            }
            current.clone()
        })
        .collect()
}
