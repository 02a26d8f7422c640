//! Example of a multi-day report over a larger synthetic fleet.
//!
//! Run with: cargo run --example batch_report --features parallel

use chrono::{NaiveDate, TimeDelta};
use region_dwell::{
    analyze_batch, analyze_batch_parallel, AnalysisConfig, AnalysisWindow, Bounds, Fix, Region,
    RegionIndex, Roster, Trajectory,
};
use std::time::Instant;

fn main() {
    println!("Batch Region Report Example\n");

    // 20 x 20 grid of square districts
    let mut regions = Vec::new();
    for row in 0..20 {
        for col in 0..20 {
            regions.push(Region::rectangle(
                format!("D{:02}-{:02}", row, col),
                Bounds {
                    min_lat: row as f64 * 0.1,
                    max_lat: (row + 1) as f64 * 0.1,
                    min_lng: col as f64 * 0.1,
                    max_lng: (col + 1) as f64 * 0.1,
                },
            ));
        }
    }
    let index = RegionIndex::build(regions).expect("valid regions");

    let config = AnalysisConfig::default();
    let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    let window = AnalysisWindow::local_day(day, &config.time_zone);

    // Each vehicle drives a diagonal loop, one fix per minute
    let mut trajectories = Vec::new();
    let mut roster = Roster::new();
    for v in 0..200 {
        let id = format!("vehicle-{:03}", v);
        let origin = 0.05 + (v % 19) as f64 * 0.1;
        let fixes: Vec<Fix> = (0..600)
            .map(|i| {
                let leg = if i < 300 { i } else { 600 - i };
                let offset = leg as f64 * 0.0005;
                let speed = if i % 120 < 20 { 0.0 } else { 30.0 };
                let at = window.start + TimeDelta::hours(6) + TimeDelta::minutes(i);
                Fix::new(&id, at, (origin + offset).min(1.99), origin, speed)
            })
            .collect();
        roster.assign(&id, format!("D{:02}-{:02}", (v % 19) + 1, v % 19));
        trajectories.push(Trajectory::new(id, fixes));
    }

    println!("Created {} trajectories\n", trajectories.len());

    let start = Instant::now();
    let sequential = analyze_batch(&index, &trajectories, &roster, &window, &config);
    println!("Sequential: {:?}", start.elapsed());

    let start = Instant::now();
    let parallel = analyze_batch_parallel(&index, &trajectories, &roster, &window, &config);
    println!("Parallel:   {:?}\n", start.elapsed());

    assert_eq!(sequential, parallel);

    let departed = parallel.iter().filter(|r| r.departed()).count();
    let returned = parallel
        .iter()
        .filter(|r| r.departure.as_ref().is_some_and(|d| d.returned_home))
        .count();
    let crossings: usize = parallel.iter().map(|r| r.crossings.len()).sum();

    println!("Departed: {}", departed);
    println!("Returned: {}", returned);
    println!("Crossings: {}", crossings);
}
