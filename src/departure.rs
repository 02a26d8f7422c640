//! Home-region departure and return analysis.
//!
//! The home region is wherever the entity's first fix of the window lies
//! (possibly outside every region, i.e. `None`). From the crossing list:
//!
//! - the departure is the first crossing leaving home
//! - the return candidate is the last crossing back into home after that
//! - the return only counts if the entity never left home again after it
//!
//! Coverage compares the regions entered against the entity's roster of
//! responsible regions. A responsible home region counts as visited.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crossings::CrossingEvent;

/// Where an entity stands relative to its home region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepartureState {
    /// Never left home in the window
    #[default]
    AtHome,
    /// Left home and is not durably back
    Departed,
    /// Left home and came back for good
    Returned,
}

/// Summary verdict over the responsible regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageStatus {
    /// The roster assigns no regions to this entity
    NoneAssigned,
    AllVisited,
    Partial,
    NoneVisited,
}

/// Responsible regions split into visited and missed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub visited: BTreeSet<String>,
    pub missed: BTreeSet<String>,
    pub status: CoverageStatus,
}

impl Coverage {
    fn evaluate(
        responsible: &BTreeSet<String>,
        entered: &BTreeSet<String>,
        home: Option<&str>,
    ) -> Self {
        let visited: BTreeSet<String> = responsible
            .iter()
            .filter(|r| entered.contains(*r) || home == Some(r.as_str()))
            .cloned()
            .collect();
        let missed: BTreeSet<String> = responsible.difference(&visited).cloned().collect();

        let status = if responsible.is_empty() {
            CoverageStatus::NoneAssigned
        } else if missed.is_empty() {
            CoverageStatus::AllVisited
        } else if visited.is_empty() {
            CoverageStatus::NoneVisited
        } else {
            CoverageStatus::Partial
        };

        Self {
            visited,
            missed,
            status,
        }
    }
}

/// Departure/return outcome for one entity in one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartureReturnRecord {
    pub entity_id: String,
    pub home_region: Option<String>,
    pub departure_event: Option<CrossingEvent>,
    /// Set only when the return is durable
    pub return_event: Option<CrossingEvent>,
    pub returned_home: bool,
    /// Every named region entered during the window
    pub visited_regions: BTreeSet<String>,
    pub responsible_regions: BTreeSet<String>,
    pub first_entry_time_per_responsible_region: BTreeMap<String, DateTime<Utc>>,
    pub coverage: Coverage,
}

impl DepartureReturnRecord {
    pub fn state(&self) -> DepartureState {
        match (&self.departure_event, self.returned_home) {
            (None, _) => DepartureState::AtHome,
            (Some(_), true) => DepartureState::Returned,
            (Some(_), false) => DepartureState::Departed,
        }
    }

    pub fn departed(&self) -> bool {
        self.departure_event.is_some()
    }
}

/// Analyze departure from and return to `home_region`.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use region_dwell::{analyze_departure, CrossingEvent, DepartureState};
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
/// let crossings = vec![cross("A", "B", 200), cross("B", "A", 400)];
/// let record = analyze_departure("u", &crossings, Some("A"), &BTreeSet::new(), at(0));
///
/// assert_eq!(record.state(), DepartureState::Returned);
/// assert_eq!(record.return_event.unwrap().timestamp, at(400));
/// ```
pub fn analyze_departure(
    entity_id: &str,
    crossings: &[CrossingEvent],
    home_region: Option<&str>,
    responsible: &BTreeSet<String>,
    window_start: DateTime<Utc>,
) -> DepartureReturnRecord {
    let departure = crossings.iter().position(|e| e.leaves(home_region));

    let mut return_event = None;
    if let Some(departed_at) = departure {
        let after = &crossings[departed_at + 1..];
        if let Some(candidate) = after.iter().rposition(|e| e.enters(home_region)) {
            let left_again = after[candidate + 1..].iter().any(|e| e.leaves(home_region));
            if !left_again {
                return_event = Some(after[candidate].clone());
            }
        }
    }

    let visited_regions: BTreeSet<String> = crossings
        .iter()
        .filter_map(|e| e.to_region.clone())
        .collect();

    let mut first_entry = BTreeMap::new();
    if let Some(home) = home_region.filter(|h| responsible.contains(*h)) {
        first_entry.insert(home.to_string(), window_start);
    }
    for event in crossings {
        if let Some(region) = event.to_region.as_ref().filter(|r| responsible.contains(*r)) {
            first_entry.entry(region.clone()).or_insert(event.timestamp);
        }
    }

    let coverage = Coverage::evaluate(responsible, &visited_regions, home_region);

    DepartureReturnRecord {
        entity_id: entity_id.to_string(),
        home_region: home_region.map(str::to_string),
        departure_event: departure.map(|i| crossings[i].clone()),
        returned_home: return_event.is_some(),
        return_event,
        visited_regions,
        responsible_regions: responsible.clone(),
        first_entry_time_per_responsible_region: first_entry,
        coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::from_unix_seconds;

    fn at(secs: i64) -> DateTime<Utc> {
        from_unix_seconds(secs).unwrap()
    }

    fn cross(from: Option<&str>, to: Option<&str>, t: i64) -> CrossingEvent {
        CrossingEvent {
            from_region: from.map(str::to_string),
            to_region: to.map(str::to_string),
            timestamp: at(t),
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_departure_and_return() {
        let crossings = vec![
            cross(Some("A"), Some("B"), 200),
            cross(Some("B"), Some("A"), 400),
        ];
        let record = analyze_departure("u", &crossings, Some("A"), &set(&[]), at(0));

        assert_eq!(record.departure_event.as_ref().unwrap().timestamp, at(200));
        assert_eq!(record.return_event.as_ref().unwrap().timestamp, at(400));
        assert!(record.returned_home);
        assert_eq!(record.state(), DepartureState::Returned);
    }

    #[test]
    fn test_never_departed() {
        let record = analyze_departure("u", &[], Some("A"), &set(&["A"]), at(0));
        assert!(record.departure_event.is_none());
        assert!(!record.returned_home);
        assert_eq!(record.state(), DepartureState::AtHome);
        assert_eq!(record.coverage.status, CoverageStatus::AllVisited);
    }

    #[test]
    fn test_left_again_is_not_a_return() {
        let crossings = vec![
            cross(Some("A"), Some("B"), 100),
            cross(Some("B"), Some("A"), 200),
            cross(Some("A"), Some("C"), 300),
        ];
        let record = analyze_departure("u", &crossings, Some("A"), &set(&[]), at(0));

        assert!(!record.returned_home);
        assert!(record.return_event.is_none());
        assert_eq!(record.state(), DepartureState::Departed);
    }

    #[test]
    fn test_last_return_selected() {
        let crossings = vec![
            cross(Some("A"), Some("B"), 100),
            cross(Some("B"), Some("A"), 200),
            cross(Some("A"), Some("C"), 300),
            cross(Some("C"), Some("A"), 400),
        ];
        let record = analyze_departure("u", &crossings, Some("A"), &set(&[]), at(0));

        assert!(record.returned_home);
        assert_eq!(record.return_event.unwrap().timestamp, at(400));
        assert_eq!(record.departure_event.unwrap().timestamp, at(100));
    }

    #[test]
    fn test_home_outside_every_region() {
        let crossings = vec![cross(None, Some("B"), 100), cross(Some("B"), None, 500)];
        let record = analyze_departure("u", &crossings, None, &set(&["B"]), at(0));

        assert!(record.home_region.is_none());
        assert_eq!(record.departure_event.as_ref().unwrap().timestamp, at(100));
        assert!(record.returned_home);
        // Leaving to "nowhere" is not a visited region
        assert_eq!(record.visited_regions, set(&["B"]));
    }

    #[test]
    fn test_first_entry_times() {
        let crossings = vec![
            cross(Some("A"), Some("B"), 100),
            cross(Some("B"), Some("C"), 200),
            cross(Some("C"), Some("B"), 300),
        ];
        let record = analyze_departure("u", &crossings, Some("A"), &set(&["A", "B", "D"]), at(0));
        let first = &record.first_entry_time_per_responsible_region;

        assert_eq!(first.get("A"), Some(&at(0)));
        assert_eq!(first.get("B"), Some(&at(100)));
        assert!(!first.contains_key("C"));
        assert!(!first.contains_key("D"));
    }

    #[test]
    fn test_coverage_statuses() {
        let crossings = vec![cross(Some("A"), Some("B"), 100)];

        let none = analyze_departure("u", &crossings, Some("A"), &set(&[]), at(0));
        assert_eq!(none.coverage.status, CoverageStatus::NoneAssigned);

        let partial = analyze_departure("u", &crossings, Some("A"), &set(&["B", "C"]), at(0));
        assert_eq!(partial.coverage.status, CoverageStatus::Partial);
        assert_eq!(partial.coverage.visited, set(&["B"]));
        assert_eq!(partial.coverage.missed, set(&["C"]));

        let missed = analyze_departure("u", &crossings, Some("A"), &set(&["C"]), at(0));
        assert_eq!(missed.coverage.status, CoverageStatus::NoneVisited);

        let home = analyze_departure("u", &crossings, Some("A"), &set(&["A", "B"]), at(0));
        assert_eq!(home.coverage.status, CoverageStatus::AllVisited);
    }
}
