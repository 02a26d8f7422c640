//! End-to-end tests: provider JSON in, per-entity reports out.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use region_dwell::*;
use std::collections::BTreeSet;

const REGIONS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "properties": {"shapeName": "Home", "name": "ignored"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}
        },
        {
            "type": "Feature",
            "properties": {"name": "Field"},
            "geometry": {"type": "MultiPolygon", "coordinates": [[[[1,0],[2,0],[2,1],[1,1],[1,0]]]]}
        },
        {
            "type": "Feature",
            "properties": {"shapeName": "Nowhere"},
            "geometry": null
        }
    ]
}"#;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn index() -> RegionIndex {
    RegionIndex::from_geojson_str(REGIONS).unwrap()
}

fn fix(entity: &str, t: i64, lng: f64, speed: f64) -> Fix {
    Fix::new(entity, at(t), 0.5, lng, speed)
}

fn day() -> AnalysisWindow {
    AnalysisWindow::new(at(0), at(86_399))
}

fn responsible(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_geojson_names_and_null_geometry() {
    let index = index();
    assert_eq!(index.len(), 2);
    let names: Vec<&str> = index.names().collect();
    assert_eq!(names, vec!["Home", "Field"]);
    assert_eq!(index.label(&GpsPoint::new(0.5, 1.5)), Some("Field"));
}

#[test]
fn test_raw_provider_fixes_are_resorted() {
    let raw: Vec<RawFix> = serde_json::from_str(
        r#"[
            {"t": 400, "lat": 0.5, "lon": 0.5, "spd": 0},
            {"t": "1970-01-01 00:00:00", "lat": 0.5, "lon": 0.5, "spd": 0},
            {"t": 200, "lat": 0.5, "lon": 1.5, "spd": 40},
            {"t": 300, "lat": null, "lon": 1.5}
        ]"#,
    )
    .unwrap();
    let trajectory = Trajectory::from_raw("van-1", &raw);

    assert_eq!(trajectory.len(), 3);
    let report = analyze_entity(
        &index(),
        &trajectory,
        &responsible(&["Field"]),
        &day(),
        &AnalysisConfig::default(),
    );

    assert_eq!(report.home_region.as_deref(), Some("Home"));
    let departure = report.departure.unwrap();
    assert_eq!(departure.departure_event.unwrap().timestamp, at(200));
    assert_eq!(departure.return_event.unwrap().timestamp, at(400));
    assert_eq!(report.region_time.seconds("Field"), 200);
}

#[test]
fn test_labels_round_trip_through_crossings() {
    let index = index();
    let path = [0.5, 0.6, 1.5, 2.5, 2.6, 1.2, 0.9, 0.9, 3.0, 0.1];
    let fixes: Vec<Fix> = path
        .iter()
        .enumerate()
        .map(|(i, lng)| fix("u", i as i64 * 60, *lng, 10.0))
        .collect();
    let trajectory = Trajectory::new("u", fixes);

    let labeled = trajectory.label(&index);
    let crossings = detect_crossings(&labeled).unwrap();
    let timestamps: Vec<_> = trajectory.fixes().iter().map(|f| f.timestamp).collect();
    let rebuilt = reconstruct_labels(labeled[0].region, &crossings, &timestamps);

    let expected: Vec<Option<String>> = labeled
        .iter()
        .map(|l| l.region.map(str::to_string))
        .collect();
    assert_eq!(rebuilt, expected);
    assert_eq!(crossings.len(), 6);
}

#[test]
fn test_single_region_trajectory_has_no_crossings() {
    let fixes: Vec<Fix> = (0..50)
        .map(|i| fix("u", i * 30, 0.1 + i as f64 * 0.01, 5.0))
        .collect();
    let report = analyze_entity(
        &index(),
        &Trajectory::new("u", fixes),
        &responsible(&["Home"]),
        &day(),
        &AnalysisConfig::default(),
    );

    assert!(report.crossings.is_empty());
    assert!(!report.departed());
    assert_eq!(report.region_time.seconds("Home"), 49 * 30);
}

#[test]
fn test_stops_outside_home_only() {
    let fixes = vec![
        fix("u", 0, 0.5, 0.0),
        fix("u", 1000, 0.5, 0.0),
        fix("u", 1100, 1.5, 30.0),
        fix("u", 1200, 1.5, 0.0),
        fix("u", 2400, 1.5, 20.0),
        fix("u", 2500, 1.5, 0.0),
        fix("u", 3100, 1.5, 20.0),
        fix("u", 3200, 0.5, 10.0),
    ];
    let trajectory = Trajectory::new("u", fixes);

    let report = analyze_entity(
        &index(),
        &trajectory,
        &BTreeSet::new(),
        &day(),
        &AnalysisConfig::default(),
    );
    assert_eq!(report.stops.len(), 1);
    assert_eq!(report.stops[0].start_time, at(1200));
    assert_eq!(report.stops[0].duration_secs, 1200);

    let keep_home = AnalysisConfig {
        exclude_home_stops: false,
        ..AnalysisConfig::default()
    };
    let report = analyze_entity(&index(), &trajectory, &BTreeSet::new(), &day(), &keep_home);
    assert_eq!(report.stops.len(), 2);
}

#[test]
fn test_empty_trajectory_reports_no_data() {
    let report = try_analyze_entity(
        &index(),
        &Trajectory::new("ghost", vec![]),
        &BTreeSet::new(),
        &day(),
        &AnalysisConfig::default(),
    );
    assert!(matches!(report, Err(TrackError::NoData { .. })));

    let report = analyze_entity(
        &index(),
        &Trajectory::new("ghost", vec![]),
        &BTreeSet::new(),
        &day(),
        &AnalysisConfig::default(),
    );
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "no data");
}

#[test]
fn test_home_outside_every_region() {
    let fixes = vec![
        fix("u", 0, 5.0, 10.0),
        fix("u", 100, 1.5, 10.0),
        fix("u", 200, 5.0, 10.0),
    ];
    let report = analyze_entity(
        &index(),
        &Trajectory::new("u", fixes),
        &responsible(&["Field"]),
        &day(),
        &AnalysisConfig::default(),
    );

    assert!(report.home_region.is_none());
    let departure = report.departure.unwrap();
    assert!(departure.returned_home);
    assert_eq!(departure.coverage.status, CoverageStatus::AllVisited);
    assert_eq!(report.region_time.seconds("Field"), 100);
}

#[test]
fn test_roster_json_drives_batch() {
    let roster = Roster::from_json_str(r#"{"a": ["Field"], "b": ["Home", "Field"]}"#).unwrap();
    let trajectories = vec![
        Trajectory::new("a", vec![fix("a", 0, 0.5, 0.0), fix("a", 60, 1.5, 10.0)]),
        Trajectory::new("b", vec![fix("b", 0, 0.5, 0.0), fix("b", 60, 0.6, 10.0)]),
    ];
    let reports = analyze_batch(
        &index(),
        &trajectories,
        &roster,
        &day(),
        &AnalysisConfig::default(),
    );

    let a = reports[0].departure.as_ref().unwrap();
    assert_eq!(a.coverage.status, CoverageStatus::AllVisited);
    assert_eq!(a.state(), DepartureState::Departed);

    let b = reports[1].departure.as_ref().unwrap();
    assert_eq!(b.coverage.status, CoverageStatus::Partial);
    assert_eq!(b.first_entry_time_per_responsible_region.get("Home"), Some(&at(0)));
}

#[test]
fn test_local_day_batch() {
    // UTC+5: local 2025-03-01 starts at 2025-02-28 19:00 UTC
    let config = AnalysisConfig::default();
    let start = Utc.with_ymd_and_hms(2025, 2, 28, 19, 0, 0).unwrap();
    let trajectories = vec![Trajectory::new(
        "u",
        vec![
            Fix::new("u", start - chrono::TimeDelta::seconds(1), 0.5, 0.5, 0.0),
            Fix::new("u", start, 0.5, 0.5, 0.0),
            Fix::new("u", start + chrono::TimeDelta::hours(1), 0.5, 1.5, 20.0),
        ],
    )];
    let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    let days = analyze_days(&index(), &trajectories, &Roster::new(), date, date, &config);

    assert_eq!(days.len(), 1);
    let report = &days[0].departed[0];
    assert_eq!(report.fix_count, 2);

    let row = report.summary(&config.time_zone);
    assert_eq!(row.departure_time.as_deref(), Some("2025-03-01 01:00:00"));
}
