//! Dwell heat map generation.
//!
//! Creates a sparse grid of cells from dwell records, tracking:
//! - Total dwell time per cell (the heat weight)
//! - How many dwell gaps fell into each cell
//! - Entities that dwelled there, for drill-down
//! - First and last time a dwell started in the cell
//!
//! Records with zero dwell carry no weight and are skipped.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::dwell::DwellRecord;
use crate::{Bounds, GpsPoint};

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Configuration for heat map generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Grid cell size in meters (default: 100m)
    pub cell_size_meters: f64,
    /// Optional bounds to limit computation
    pub bounds: Option<Bounds>,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            cell_size_meters: 100.0,
            bounds: None,
        }
    }
}

/// A single cell in the heat map grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    /// Grid row index
    pub row: i32,
    /// Grid column index
    pub col: i32,
    /// Cell center for rendering
    pub center_lat: f64,
    pub center_lng: f64,
    /// Normalized weight (0.0-1.0) for color mapping
    pub density: f32,
    /// Sum of dwell seconds in this cell
    pub dwell_seconds: i64,
    /// Number of dwell gaps in this cell
    pub dwell_count: u32,
    /// Entities that dwelled here (sorted)
    pub entity_ids: Vec<String>,
    /// Earliest dwell start
    pub first_visit: i64,
    /// Most recent dwell start
    pub last_visit: i64,
}

/// Complete heat map result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapResult {
    /// Non-empty cells only (sparse representation)
    pub cells: Vec<HeatmapCell>,
    /// Computed bounds of the contributing records
    pub bounds: Option<Bounds>,
    /// Cell size used
    pub cell_size_meters: f64,
    /// Latitude the longitude scale was taken at
    pub ref_lat: f64,
    /// Grid dimensions
    pub grid_rows: u32,
    pub grid_cols: u32,
    /// Largest per-cell dwell, used for normalization
    pub max_dwell_seconds: i64,
    /// Summary stats
    pub total_dwell_seconds: i64,
    pub total_entities: u32,
}

// Internal cell data during construction
#[derive(Debug, Default)]
struct CellBuilder {
    dwell_seconds: i64,
    dwell_count: u32,
    entity_ids: BTreeSet<String>,
    first_visit: Option<i64>,
    last_visit: Option<i64>,
}

/// Grid coordinate
type CellCoord = (i32, i32);

#[derive(Debug, Clone, Copy)]
struct GridGeometry {
    cell_size_meters: f64,
    ref_lat: f64,
}

impl GridGeometry {
    fn lng_meters_per_deg(&self) -> f64 {
        METERS_PER_DEGREE * self.ref_lat.to_radians().cos()
    }

    /// Convert lat/lng to grid coordinates
    fn to_grid_coords(&self, lat: f64, lng: f64) -> CellCoord {
        let row = ((lat - self.ref_lat) * METERS_PER_DEGREE / self.cell_size_meters).floor() as i32;
        let col = (lng * self.lng_meters_per_deg() / self.cell_size_meters).floor() as i32;
        (row, col)
    }

    /// Get cell center coordinates
    fn cell_center(&self, row: i32, col: i32) -> (f64, f64) {
        let center_lat =
            self.ref_lat + ((row as f64 + 0.5) * self.cell_size_meters / METERS_PER_DEGREE);
        let center_lng = (col as f64 + 0.5) * self.cell_size_meters / self.lng_meters_per_deg();
        (center_lat, center_lng)
    }
}

/// Heat map grid builder
struct HeatmapGrid {
    geometry: Option<GridGeometry>,
    cell_size_meters: f64,
    cells: HashMap<CellCoord, CellBuilder>,
    bounds: Option<Bounds>,
}

impl HeatmapGrid {
    fn new(cell_size_meters: f64) -> Self {
        Self {
            geometry: None,
            cell_size_meters,
            cells: HashMap::new(),
            bounds: None,
        }
    }

    /// Add a dwell record to the grid
    fn add_record(&mut self, record: &DwellRecord) {
        let (lat, lng) = (record.latitude, record.longitude);

        // Update bounds
        let bounds = self.bounds.get_or_insert(Bounds {
            min_lat: lat,
            max_lat: lat,
            min_lng: lng,
            max_lng: lng,
        });
        bounds.min_lat = bounds.min_lat.min(lat);
        bounds.max_lat = bounds.max_lat.max(lat);
        bounds.min_lng = bounds.min_lng.min(lng);
        bounds.max_lng = bounds.max_lng.max(lng);

        // First record fixes the reference latitude
        let cell_size_meters = self.cell_size_meters;
        let geometry = *self.geometry.get_or_insert(GridGeometry {
            cell_size_meters,
            ref_lat: lat,
        });

        let cell = self.cells.entry(geometry.to_grid_coords(lat, lng)).or_default();
        cell.dwell_seconds += record.dwelling_seconds;
        cell.dwell_count += 1;
        cell.entity_ids.insert(record.entity_id.clone());

        let ts = record.ended_at.timestamp();
        cell.first_visit = Some(cell.first_visit.map_or(ts, |v| v.min(ts)));
        cell.last_visit = Some(cell.last_visit.map_or(ts, |v| v.max(ts)));
    }

    /// Build the final heat map result
    fn build(self) -> HeatmapResult {
        let Some(geometry) = self.geometry else {
            return HeatmapResult {
                cells: vec![],
                bounds: None,
                cell_size_meters: self.cell_size_meters,
                ref_lat: 0.0,
                grid_rows: 0,
                grid_cols: 0,
                max_dwell_seconds: 0,
                total_dwell_seconds: 0,
                total_entities: 0,
            };
        };

        let max_dwell_seconds = self
            .cells
            .values()
            .map(|c| c.dwell_seconds)
            .max()
            .unwrap_or(1)
            .max(1);

        let mut all_entities = BTreeSet::new();
        let mut total_dwell_seconds = 0;

        let mut cells: Vec<HeatmapCell> = self
            .cells
            .iter()
            .map(|(&(row, col), builder)| {
                let (center_lat, center_lng) = geometry.cell_center(row, col);
                all_entities.extend(builder.entity_ids.iter().cloned());
                total_dwell_seconds += builder.dwell_seconds;

                HeatmapCell {
                    row,
                    col,
                    center_lat,
                    center_lng,
                    density: (builder.dwell_seconds as f64 / max_dwell_seconds as f64) as f32,
                    dwell_seconds: builder.dwell_seconds,
                    dwell_count: builder.dwell_count,
                    entity_ids: builder.entity_ids.iter().cloned().collect(),
                    first_visit: builder.first_visit.unwrap_or_default(),
                    last_visit: builder.last_visit.unwrap_or_default(),
                }
            })
            .collect();

        // HashMap iteration order is arbitrary; keep output stable
        cells.sort_by_key(|c| (c.row, c.col));

        // Calculate grid dimensions
        let min_row = cells.iter().map(|c| c.row).min().unwrap_or(0);
        let max_row = cells.iter().map(|c| c.row).max().unwrap_or(0);
        let min_col = cells.iter().map(|c| c.col).min().unwrap_or(0);
        let max_col = cells.iter().map(|c| c.col).max().unwrap_or(0);

        HeatmapResult {
            cells,
            bounds: self.bounds,
            cell_size_meters: self.cell_size_meters,
            ref_lat: geometry.ref_lat,
            grid_rows: grid_span(min_row, max_row),
            grid_cols: grid_span(min_col, max_col),
            max_dwell_seconds,
            total_dwell_seconds,
            total_entities: all_entities.len() as u32,
        }
    }
}

/// Number of cells from `min` to `max` inclusive, saturating at `u32::MAX`.
fn grid_span(min: i32, max: i32) -> u32 {
    let span = (max as i64 - min as i64).saturating_add(1);
    u32::try_from(span).unwrap_or(u32::MAX)
}

/// Generate a dwell-weighted heat map from dwell records.
///
/// A cell size that is not a positive finite number yields an empty map.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use region_dwell::{generate_dwell_heatmap, DwellRecord, HeatmapConfig};
///
/// let record = DwellRecord {
///     trip_id: "t1".into(),
///     entity_id: "van-3".into(),
///     latitude: 43.2389,
///     longitude: 76.8897,
///     ended_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
///     dwelling_seconds: 1800,
/// };
///
/// let heatmap = generate_dwell_heatmap(&[record], &HeatmapConfig::default());
/// assert_eq!(heatmap.cells.len(), 1);
/// assert_eq!(heatmap.total_dwell_seconds, 1800);
/// ```
pub fn generate_dwell_heatmap(records: &[DwellRecord], config: &HeatmapConfig) -> HeatmapResult {
    let mut grid = HeatmapGrid::new(config.cell_size_meters);

    if !(config.cell_size_meters.is_finite() && config.cell_size_meters > 0.0) {
        log::warn!(
            "[Heatmap] Invalid cell size {} m, skipping {} records",
            config.cell_size_meters,
            records.len()
        );
        return grid.build();
    }

    for record in records.iter().filter(|r| r.dwelling_seconds > 0) {
        // Skip records outside bounds if specified
        if let Some(bounds) = &config.bounds {
            if !bounds.contains(&GpsPoint::new(record.latitude, record.longitude)) {
                continue;
            }
        }

        grid.add_record(record);
    }

    grid.build()
}

/// Query the heat map cell under a location.
pub fn query_heatmap_cell(heatmap: &HeatmapResult, lat: f64, lng: f64) -> Option<&HeatmapCell> {
    if heatmap.cells.is_empty() {
        return None;
    }

    // Same grid geometry as during generation
    let geometry = GridGeometry {
        cell_size_meters: heatmap.cell_size_meters,
        ref_lat: heatmap.ref_lat,
    };
    let (row, col) = geometry.to_grid_coords(lat, lng);

    heatmap.cells.iter().find(|c| c.row == row && c.col == col)
}
