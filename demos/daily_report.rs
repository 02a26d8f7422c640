//! Example of a one-day departure report for a small fleet.
//!
//! Run with: cargo run --example daily_report

use chrono::{NaiveDate, TimeDelta};
use region_dwell::{
    analyze_batch, AnalysisConfig, AnalysisWindow, Bounds, Fix, Region, RegionIndex, Roster,
    Trajectory,
};

fn main() {
    println!("Daily Region Report Example\n");

    // Three districts side by side along the equator, 0.1 degree wide
    let district = |name: &str, west: f64| {
        Region::rectangle(
            name,
            Bounds {
                min_lat: 0.0,
                max_lat: 0.1,
                min_lng: west,
                max_lng: west + 0.1,
            },
        )
    };
    let index = RegionIndex::build(vec![
        district("Depot", 0.0),
        district("Market", 0.1),
        district("Harbour", 0.2),
    ])
    .expect("valid regions");

    let config = AnalysisConfig::default();
    let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    let window = AnalysisWindow::local_day(day, &config.time_zone);

    // Fix every 10 minutes following a list of (longitude, speed) stops
    let track = |id: &str, path: &[(f64, f64)]| {
        let fixes = path
            .iter()
            .enumerate()
            .map(|(i, (lng, speed))| {
                let at = window.start + TimeDelta::hours(8) + TimeDelta::minutes(10 * i as i64);
                Fix::new(id, at, 0.05, *lng, *speed)
            })
            .collect();
        Trajectory::new(id, fixes)
    };

    let trajectories = vec![
        // Out to the harbour, waits, and comes back
        track(
            "truck-1",
            &[(0.05, 0.0), (0.15, 40.0), (0.25, 35.0), (0.25, 0.0), (0.25, 0.0), (0.25, 0.0), (0.15, 30.0), (0.05, 20.0)],
        ),
        // Goes to market and stays there
        track("truck-2", &[(0.05, 0.0), (0.15, 30.0), (0.15, 0.0), (0.15, 0.0)]),
        // Never leaves the depot
        track("truck-3", &[(0.05, 0.0), (0.06, 5.0), (0.05, 0.0)]),
        // Nothing received today
        Trajectory::new("truck-4", vec![]),
    ];

    let roster = Roster::from_pairs([
        ("truck-1", "Harbour"),
        ("truck-1", "Market"),
        ("truck-2", "Harbour"),
        ("truck-3", "Depot"),
    ]);

    let reports = analyze_batch(&index, &trajectories, &roster, &window, &config);

    for report in &reports {
        let row = report.summary(&config.time_zone);
        println!("{} ({:?})", row.entity_id, row.status);
        println!("  Home:      {}", row.home_region.as_deref().unwrap_or("-"));
        println!("  State:     {:?}", row.state);
        println!("  Departed:  {}", row.departure_time.as_deref().unwrap_or("-"));
        println!("  Returned:  {}", row.return_time.as_deref().unwrap_or("-"));
        println!("  Coverage:  {}", row.coverage_comment);
        for line in &row.first_entries {
            println!("  First in:  {}", line);
        }
        for line in &row.region_time {
            println!("  Time in:   {}", line);
        }
        for stop in &report.stops {
            println!(
                "  Stop:      {} for {}s",
                config.time_zone.format_local(stop.start_time),
                stop.duration_secs
            );
        }
        println!();
    }
}
