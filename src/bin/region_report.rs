//! region-report CLI - daily departure reports and dwell heat maps
//!
//! Usage:
//!   region-report departures --regions <geojson> --fixes <json> --from <date> [--to <date>]
//!                            [--roster <json>] [--config <json>] [--output <file>]
//!   region-report dwell --trips <json> [--cell-size <m>] [--tolerance <deg>]
//!                       [--config <json>] [--output <file>]
//!
//! `--fixes` is a JSON object mapping entity id to a list of provider fixes
//! (`{"t": ..., "lat": ..., "lon": ..., "spd": ...}`). `--roster` maps entity
//! id to the regions it is responsible for. Entities named only in the roster
//! are reported as "no data".

use clap::{Parser, Subcommand};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use region_dwell::{
    aggregate_dwell, analyze_days, dwell_by_location, generate_dwell_heatmap, AnalysisConfig,
    DailyReport, HeatmapConfig, RawFix, RegionIndex, Result, Roster, Trajectory, TripSegment,
};

#[derive(Parser)]
#[command(name = "region-report")]
#[command(about = "Region crossing and dwell reports for GPS fleets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print per-entity rows to stdout
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily departure / return and responsible-region report
    Departures {
        /// Region boundaries (GeoJSON FeatureCollection)
        #[arg(long)]
        regions: PathBuf,

        /// Fixes per entity (JSON object of arrays)
        #[arg(long)]
        fixes: PathBuf,

        /// Responsible regions per entity (JSON object of arrays)
        #[arg(long)]
        roster: Option<PathBuf>,

        /// First local day (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last local day, inclusive (defaults to --from)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Analysis configuration (JSON, partial allowed)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write reports here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Trip-gap dwell times and a dwell heat map
    Dwell {
        /// Trip segments (JSON array)
        #[arg(long)]
        trips: PathBuf,

        /// Heat map cell size in meters
        #[arg(long, default_value = "100")]
        cell_size: f64,

        /// Same-place tolerance in degrees (overrides the config's dwell tolerance)
        #[arg(long)]
        tolerance: Option<f64>,

        /// Analysis configuration (JSON, partial allowed)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Departures {
            regions,
            fixes,
            roster,
            from,
            to,
            config,
            output,
        } => run_departures(
            &regions,
            &fixes,
            roster.as_deref(),
            from,
            to.unwrap_or(from),
            config.as_deref(),
            output.as_deref(),
            cli.verbose,
        ),
        Commands::Dwell {
            trips,
            cell_size,
            tolerance,
            config,
            output,
        } => run_dwell(&trips, cell_size, tolerance, config.as_deref(), output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_departures(
    regions: &Path,
    fixes: &Path,
    roster: Option<&Path>,
    from: NaiveDate,
    to: NaiveDate,
    config: Option<&Path>,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => AnalysisConfig::from_json_path(path)?,
        None => AnalysisConfig::default(),
    };
    let roster = match roster {
        Some(path) => Roster::from_json_path(path)?,
        None => Roster::new(),
    };

    // Shared setup: a broken boundary dataset aborts the run
    let index = RegionIndex::from_geojson_path(regions)?;

    let raw: BTreeMap<String, Vec<RawFix>> = serde_json::from_str(&fs::read_to_string(fixes)?)?;
    let mut entities: BTreeSet<&str> = raw.keys().map(String::as_str).collect();
    entities.extend(roster.entities());

    let trajectories: Vec<Trajectory> = entities
        .into_iter()
        .map(|id| match raw.get(id) {
            Some(fixes) => Trajectory::from_raw(id, fixes),
            None => Trajectory::new(id, Vec::new()),
        })
        .collect();

    let days = analyze_days(&index, &trajectories, &roster, from, to, &config);

    if verbose {
        print_days(&days, &config);
    }

    write_json(output, &days)
}

fn print_days(days: &[DailyReport], config: &AnalysisConfig) {
    for day in days {
        println!("\n{}", "=".repeat(60));
        println!("Date: {}", day.date);
        println!("{}", "=".repeat(60));

        let sections = [
            ("Departed", &day.departed),
            ("Not departed", &day.not_departed),
            ("No data", &day.no_data),
        ];
        for (title, reports) in sections {
            if reports.is_empty() {
                continue;
            }
            println!("\n  {} ({})", title, reports.len());
            for report in reports {
                let row = report.summary(&config.time_zone);
                println!(
                    "    {:<16} home: {:<20} left: {:<19} back: {:<19} {}",
                    row.entity_id,
                    row.home_region.as_deref().unwrap_or("-"),
                    row.departure_time.as_deref().unwrap_or("-"),
                    row.return_time.as_deref().unwrap_or("-"),
                    row.coverage_comment
                );
                for line in row.region_time {
                    println!("      {}", line);
                }
            }
        }
    }
}

fn run_dwell(
    trips: &Path,
    cell_size: f64,
    tolerance: Option<f64>,
    config: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let config = match config {
        Some(path) => AnalysisConfig::from_json_path(path)?,
        None => AnalysisConfig::default(),
    };
    let tolerance = tolerance.unwrap_or(config.dwell.distance_tolerance);

    let trips: Vec<TripSegment> = serde_json::from_str(&fs::read_to_string(trips)?)?;

    let records = aggregate_dwell(&trips, tolerance);
    let locations = dwell_by_location(&records);
    let heatmap = generate_dwell_heatmap(
        &records,
        &HeatmapConfig {
            cell_size_meters: cell_size,
            bounds: None,
        },
    );

    log::info!(
        "[Dwell] {} trips, {} dwell locations, {} heat map cells",
        trips.len(),
        locations.len(),
        heatmap.cells.len()
    );

    let result = serde_json::json!({
        "records": records,
        "locations": locations,
        "heatmap": heatmap,
    });
    write_json(output, &result)
}

fn write_json<T: serde::Serialize>(output: Option<&Path>, value: &T) -> Result<()> {
    match output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
            log::info!("Wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}
