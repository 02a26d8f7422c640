//! # Trip-Gap Dwell Pairing
//!
//! Dwell time from discrete trip records rather than raw fixes: when one trip
//! ends where the next trip of the same entity starts, the gap between them
//! is time spent at that place.
//!
//! This is independent of [`crate::stops`], which works on speed samples.
//!
//! ## Algorithm
//! 1. Group trips by entity and sort each group by start time
//! 2. For each adjacent pair `(i, i + 1)`, measure the planar distance from
//!    trip `i`'s end to trip `i + 1`'s start
//! 3. If the distance is below the tolerance and `start[i + 1] - end[i] > 0`,
//!    trip `i` gets that gap as its dwell time; otherwise its dwell is 0

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::planar_distance;
use crate::time::AnalysisWindow;
use crate::GpsPoint;

/// Configuration for trip-gap dwell pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellConfig {
    /// Maximum planar distance (degrees) between a trip end and the next
    /// trip start for them to count as the same place. Default: 1e-4
    pub distance_tolerance: f64,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            distance_tolerance: 1e-4,
        }
    }
}

/// A pre-aggregated trip of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSegment {
    pub id: String,
    pub entity_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
}

impl TripSegment {
    pub fn start_point(&self) -> GpsPoint {
        GpsPoint::new(self.start_lat, self.start_lon)
    }

    pub fn end_point(&self) -> GpsPoint {
        GpsPoint::new(self.end_lat, self.end_lon)
    }
}

/// Time spent at the end location of one trip before the next trip started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwellRecord {
    /// The earlier trip of the pair
    pub trip_id: String,
    pub entity_id: String,
    /// End position of the earlier trip
    pub latitude: f64,
    pub longitude: f64,
    pub ended_at: DateTime<Utc>,
    /// 0 when the next trip starts elsewhere, overlaps, or does not exist
    pub dwelling_seconds: i64,
}

/// Total dwell at one exact end position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDwell {
    pub latitude: f64,
    pub longitude: f64,
    pub dwelling_seconds: i64,
}

/// Pair consecutive trips per entity and compute dwell at each trip end.
///
/// Returns one record per input trip, ordered by entity then start time.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use region_dwell::{aggregate_dwell, TripSegment};
///
/// let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();
/// let trip = |id: &str, start, end, from: (f64, f64), to: (f64, f64)| TripSegment {
///     id: id.to_string(),
///     entity_id: "van-3".to_string(),
///     start_time: at(start),
///     end_time: at(end),
///     start_lat: from.0,
///     start_lon: from.1,
///     end_lat: to.0,
///     end_lon: to.1,
/// };
///
/// let trips = vec![
///     trip("t1", 0, 100, (9.0, 19.0), (10.0, 20.0)),
///     trip("t2", 160, 400, (10.00005, 20.00005), (11.0, 21.0)),
/// ];
///
/// let dwell = aggregate_dwell(&trips, 1e-4);
/// assert_eq!(dwell[0].dwelling_seconds, 60);
/// assert_eq!(dwell[1].dwelling_seconds, 0);
/// ```
pub fn aggregate_dwell(trips: &[TripSegment], distance_tolerance: f64) -> Vec<DwellRecord> {
    let mut by_entity: BTreeMap<&str, Vec<&TripSegment>> = BTreeMap::new();
    for trip in trips {
        by_entity.entry(trip.entity_id.as_str()).or_default().push(trip);
    }

    let mut records = Vec::with_capacity(trips.len());

    for (entity_id, mut group) in by_entity {
        group.sort_by_key(|t| t.start_time);

        let mut paired = 0usize;
        for (i, trip) in group.iter().enumerate() {
            let dwelling_seconds = group
                .get(i + 1)
                .map(|next| gap_at_same_place(trip, next, distance_tolerance))
                .unwrap_or(0);
            if dwelling_seconds > 0 {
                paired += 1;
            }

            records.push(DwellRecord {
                trip_id: trip.id.clone(),
                entity_id: entity_id.to_string(),
                latitude: trip.end_lat,
                longitude: trip.end_lon,
                ended_at: trip.end_time,
                dwelling_seconds,
            });
        }

        debug!(
            "[Dwell] {}: {} trips, {} dwell gaps",
            entity_id,
            group.len(),
            paired
        );
    }

    records
}

fn gap_at_same_place(trip: &TripSegment, next: &TripSegment, tolerance: f64) -> i64 {
    let distance = planar_distance(&trip.end_point(), &next.start_point());
    if !(distance < tolerance) {
        return 0;
    }
    let gap = (next.start_time - trip.end_time).num_seconds();
    if gap > 0 {
        gap
    } else {
        0
    }
}

/// Keep trips lying entirely inside `window`, optionally for one entity only.
pub fn filter_trips(
    trips: &[TripSegment],
    window: &AnalysisWindow,
    entity_id: Option<&str>,
) -> Vec<TripSegment> {
    trips
        .iter()
        .filter(|t| t.start_time >= window.start && t.end_time <= window.end)
        .filter(|t| entity_id.map_or(true, |id| t.entity_id == id))
        .cloned()
        .collect()
}

/// Sum dwell per exact end position, in order of first appearance.
pub fn dwell_by_location(records: &[DwellRecord]) -> Vec<LocationDwell> {
    let mut slots: HashMap<(u64, u64), usize> = HashMap::new();
    let mut totals: Vec<LocationDwell> = Vec::new();

    for record in records {
        let key = (record.latitude.to_bits(), record.longitude.to_bits());
        let slot = *slots.entry(key).or_insert_with(|| {
            totals.push(LocationDwell {
                latitude: record.latitude,
                longitude: record.longitude,
                dwelling_seconds: 0,
            });
            totals.len() - 1
        });
        totals[slot].dwelling_seconds += record.dwelling_seconds;
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::from_unix_seconds;

    fn trip(
        id: &str,
        entity: &str,
        start: i64,
        end: i64,
        from: (f64, f64),
        to: (f64, f64),
    ) -> TripSegment {
        TripSegment {
            id: id.to_string(),
            entity_id: entity.to_string(),
            start_time: from_unix_seconds(start).unwrap(),
            end_time: from_unix_seconds(end).unwrap(),
            start_lat: from.0,
            start_lon: from.1,
            end_lat: to.0,
            end_lon: to.1,
        }
    }

    #[test]
    fn test_positive_gap_at_same_place() {
        let trips = vec![
            trip("t1", "a", 0, 100, (9.0, 19.0), (10.0, 20.0)),
            trip("t2", "a", 160, 300, (10.00005, 20.00005), (12.0, 22.0)),
        ];
        let records = aggregate_dwell(&trips, 1e-4);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].trip_id, "t1");
        assert_eq!(records[0].dwelling_seconds, 60);
        assert_eq!(records[0].latitude, 10.0);
        assert_eq!(records[1].dwelling_seconds, 0);
    }

    #[test]
    fn test_negative_gap_is_zero() {
        let trips = vec![
            trip("t1", "a", 0, 100, (9.0, 19.0), (10.0, 20.0)),
            trip("t2", "a", 90, 300, (10.00005, 20.00005), (12.0, 22.0)),
        ];
        let records = aggregate_dwell(&trips, 1e-4);
        assert!(records.iter().all(|r| r.dwelling_seconds == 0));
    }

    #[test]
    fn test_distant_start_is_zero() {
        let trips = vec![
            trip("t1", "a", 0, 100, (9.0, 19.0), (10.0, 20.0)),
            trip("t2", "a", 500, 600, (10.01, 20.0), (12.0, 22.0)),
        ];
        assert_eq!(aggregate_dwell(&trips, 1e-4)[0].dwelling_seconds, 0);
    }

    #[test]
    fn test_groups_by_entity_and_sorts() {
        let trips = vec![
            trip("b2", "b", 500, 600, (1.0, 1.0), (2.0, 2.0)),
            trip("a1", "a", 0, 100, (0.0, 0.0), (1.0, 1.0)),
            trip("b1", "b", 0, 100, (0.0, 0.0), (1.0, 1.0)),
        ];
        let records = aggregate_dwell(&trips, 1e-4);
        let ids: Vec<&str> = records.iter().map(|r| r.trip_id.as_str()).collect();

        assert_eq!(ids, vec!["a1", "b1", "b2"]);
        // a1 has no successor of its own entity even though b2 starts where it ended
        assert_eq!(records[0].dwelling_seconds, 0);
        assert_eq!(records[1].dwelling_seconds, 400);
    }

    #[test]
    fn test_filter_trips() {
        let trips = vec![
            trip("t1", "a", 0, 100, (0.0, 0.0), (0.0, 0.0)),
            trip("t2", "a", 150, 250, (0.0, 0.0), (0.0, 0.0)),
            trip("t3", "b", 150, 200, (0.0, 0.0), (0.0, 0.0)),
        ];
        let window = AnalysisWindow::new(
            from_unix_seconds(50).unwrap(),
            from_unix_seconds(250).unwrap(),
        );

        assert_eq!(filter_trips(&trips, &window, None).len(), 2);
        let only_a = filter_trips(&trips, &window, Some("a"));
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].id, "t2");
    }

    #[test]
    fn test_dwell_by_location() {
        let trips = vec![
            trip("t1", "a", 0, 100, (0.0, 0.0), (5.0, 5.0)),
            trip("t2", "a", 200, 300, (5.0, 5.0), (6.0, 6.0)),
            trip("t3", "a", 400, 500, (6.0, 6.0), (5.0, 5.0)),
            trip("t4", "a", 550, 600, (5.0, 5.0), (7.0, 7.0)),
        ];
        let totals = dwell_by_location(&aggregate_dwell(&trips, 1e-4));

        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].latitude, 5.0);
        assert_eq!(totals[0].dwelling_seconds, 150);
        assert_eq!(totals[1].dwelling_seconds, 100);
    }
}
