//! # Region Index
//!
//! Immutable point-in-region lookup over a set of named polygons.
//!
//! ## Algorithm
//! 1. Each region's bounding box goes into an R-tree (bulk loaded once)
//! 2. A query point pulls the candidate regions whose box contains it
//! 3. Candidates get an exact polygon containment test
//! 4. If several polygons contain the point, the smallest area wins
//!    (ties fall back to dataset order)
//!
//! ## Boundary Semantics
//! A point lying exactly on a polygon edge is *not* contained (geo `Contains`,
//! the same as a `within` spatial join). Non-finite or out-of-range
//! coordinates never match any region.

use std::path::Path;
use std::time::Instant;

use geo::{Area, BoundingRect, Contains, Coord, LineString, MultiPolygon, Point, Polygon};
use log::{info, trace, warn};
use rstar::{RTree, RTreeObject, AABB};
use serde_json::Value;

use crate::error::{Result, TrackError};
use crate::{Bounds, GpsPoint};

/// Property holding the region name in boundary datasets.
pub const PRIMARY_NAME_KEY: &str = "shapeName";
/// Property used when [`PRIMARY_NAME_KEY`] is absent.
pub const FALLBACK_NAME_KEY: &str = "name";

/// A named polygon or multi-polygon area in (longitude, latitude) coordinates.
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

impl Region {
    /// Create a region from any polygonal geometry.
    pub fn new(name: impl Into<String>, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            name: name.into(),
            geometry: geometry.into(),
        }
    }

    /// Axis-aligned rectangle `[min_lng, min_lat]..[max_lng, max_lat]` as a region.
    ///
    /// Mostly useful for tests and synthetic datasets.
    pub fn rectangle(name: impl Into<String>, bounds: Bounds) -> Self {
        let ring = LineString::from(vec![
            (bounds.min_lng, bounds.min_lat),
            (bounds.max_lng, bounds.min_lat),
            (bounds.max_lng, bounds.max_lat),
            (bounds.min_lng, bounds.max_lat),
            (bounds.min_lng, bounds.min_lat),
        ]);
        Self::new(name, Polygon::new(ring, vec![]))
    }

    /// Bounding box of the geometry, `None` for empty geometry.
    pub fn bounds(&self) -> Option<Bounds> {
        self.geometry.bounding_rect().map(|rect| Bounds {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        })
    }
}

/// Bounding box entry stored in the R-tree. `slot` points into `RegionIndex::regions`.
#[derive(Debug, Clone)]
struct RegionEnvelope {
    slot: usize,
    bounds: Bounds,
}

impl RTreeObject for RegionEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bounds.min_lng, self.bounds.min_lat],
            [self.bounds.max_lng, self.bounds.max_lat],
        )
    }
}

#[derive(Debug)]
struct IndexedRegion {
    region: Region,
    area: f64,
}

/// Query-only spatial index answering "which region contains this point".
///
/// Built once per run and shared read-only (it is `Send + Sync`) across all
/// entity computations.
///
/// # Example
/// ```
/// use region_dwell::{Bounds, GpsPoint, Region, RegionIndex};
///
/// let index = RegionIndex::build(vec![
///     Region::rectangle("North", Bounds { min_lat: 1.0, max_lat: 2.0, min_lng: 0.0, max_lng: 1.0 }),
///     Region::rectangle("South", Bounds { min_lat: 0.0, max_lat: 1.0, min_lng: 0.0, max_lng: 1.0 }),
/// ]).unwrap();
///
/// assert_eq!(index.label(&GpsPoint::new(1.5, 0.5)), Some("North"));
/// assert_eq!(index.label(&GpsPoint::new(5.0, 5.0)), None);
/// ```
#[derive(Debug)]
pub struct RegionIndex {
    regions: Vec<IndexedRegion>,
    tree: RTree<RegionEnvelope>,
}

impl RegionIndex {
    /// Build the index. Fails if the list is empty or a region has no extent.
    pub fn build(regions: Vec<Region>) -> Result<Self> {
        let start = Instant::now();

        if regions.is_empty() {
            return Err(TrackError::InvalidRegionDataset(
                "dataset contains no regions".to_string(),
            ));
        }

        let mut indexed = Vec::with_capacity(regions.len());
        let mut envelopes = Vec::with_capacity(regions.len());

        for (slot, region) in regions.into_iter().enumerate() {
            let bounds = region.bounds().ok_or_else(|| {
                TrackError::InvalidRegionDataset(format!(
                    "region '{}' (#{}) has empty geometry",
                    region.name, slot
                ))
            })?;
            envelopes.push(RegionEnvelope { slot, bounds });
            indexed.push(IndexedRegion {
                area: region.geometry.unsigned_area(),
                region,
            });
        }

        let tree = RTree::bulk_load(envelopes);

        info!(
            "[RegionIndex] Built index of {} regions in {:?}",
            indexed.len(),
            start.elapsed()
        );

        Ok(Self {
            regions: indexed,
            tree,
        })
    }

    /// Name of the region containing `point`, or `None` if it is outside all regions.
    pub fn label(&self, point: &GpsPoint) -> Option<&str> {
        self.locate(point).map(|r| r.name.as_str())
    }

    /// The region containing `point`, after applying the smallest-area tie-break.
    pub fn locate(&self, point: &GpsPoint) -> Option<&Region> {
        if !point.is_valid() {
            return None;
        }

        let query = Point::new(point.longitude, point.latitude);
        let search = AABB::from_point([point.longitude, point.latitude]);

        let mut best: Option<&IndexedRegion> = None;
        let mut best_slot = usize::MAX;
        let mut hits = 0usize;

        for envelope in self.tree.locate_in_envelope_intersecting(&search) {
            let candidate = &self.regions[envelope.slot];
            if !candidate.region.geometry.contains(&query) {
                continue;
            }
            hits += 1;

            let wins = match best {
                None => true,
                Some(current) => {
                    candidate.area < current.area
                        || (candidate.area == current.area && envelope.slot < best_slot)
                }
            };
            if wins {
                best = Some(candidate);
                best_slot = envelope.slot;
            }
        }

        if hits > 1 {
            trace!(
                "[RegionIndex] ({:.5}, {:.5}) is inside {} regions, picked smallest",
                point.latitude,
                point.longitude,
                hits
            );
        }

        best.map(|r| &r.region)
    }

    /// Look up a region by name (first match in dataset order).
    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions
            .iter()
            .map(|r| &r.region)
            .find(|r| r.name == name)
    }

    /// Region names in dataset order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.region.name.as_str())
    }

    /// Number of indexed regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    // ------------------------------------------------------------------------
    // GeoJSON loading
    // ------------------------------------------------------------------------

    /// Build an index from a GeoJSON `FeatureCollection` string.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_geojson_value(&value)
    }

    /// Build an index from a GeoJSON file on disk.
    pub fn from_geojson_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_geojson_str(&text)
    }

    /// Build an index from a parsed GeoJSON `FeatureCollection`.
    ///
    /// Names are read from `shapeName`, then `name`, defaulting to `""`.
    /// Features with a null geometry are skipped; any other malformed
    /// feature fails the whole load.
    pub fn from_geojson_value(value: &Value) -> Result<Self> {
        Self::build(regions_from_geojson(value)?)
    }
}

/// Parse the regions of a GeoJSON `FeatureCollection`.
pub fn regions_from_geojson(value: &Value) -> Result<Vec<Region>> {
    let kind = value.get("type").and_then(Value::as_str);
    if kind != Some("FeatureCollection") {
        return Err(invalid(format!(
            "expected a FeatureCollection, found {:?}",
            kind.unwrap_or("no type")
        )));
    }

    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("FeatureCollection has no 'features' array".to_string()))?;

    let mut regions = Vec::with_capacity(features.len());
    let mut skipped = 0usize;

    for (i, feature) in features.iter().enumerate() {
        match parse_feature(i, feature)? {
            Some(region) => regions.push(region),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("[RegionIndex] Skipped {} features without geometry", skipped);
    }

    Ok(regions)
}

fn invalid(message: String) -> TrackError {
    TrackError::InvalidRegionDataset(message)
}

fn feature_name(feature: &Value) -> String {
    let props = feature.get("properties");
    let lookup = |key: &str| {
        props
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    lookup(PRIMARY_NAME_KEY)
        .or_else(|| lookup(FALLBACK_NAME_KEY))
        .unwrap_or_default()
}

fn parse_feature(i: usize, feature: &Value) -> Result<Option<Region>> {
    let name = feature_name(feature);

    let geometry = match feature.get("geometry") {
        None | Some(Value::Null) => return Ok(None),
        Some(g) => g,
    };

    let kind = geometry.get("type").and_then(Value::as_str).unwrap_or("");
    let coords = geometry
        .get("coordinates")
        .ok_or_else(|| invalid(format!("feature #{} ('{}') has no coordinates", i, name)))?;

    let multi = match kind {
        "Polygon" => MultiPolygon::new(vec![parse_polygon(coords)
            .map_err(|e| invalid(format!("feature #{} ('{}'): {}", i, name, e)))?]),
        "MultiPolygon" => {
            let parts = coords.as_array().ok_or_else(|| {
                invalid(format!("feature #{} ('{}'): MultiPolygon is not an array", i, name))
            })?;
            let polygons = parts
                .iter()
                .map(parse_polygon)
                .collect::<std::result::Result<Vec<_>, String>>()
                .map_err(|e| invalid(format!("feature #{} ('{}'): {}", i, name, e)))?;
            MultiPolygon::new(polygons)
        }
        other => {
            return Err(invalid(format!(
                "feature #{} ('{}') has unsupported geometry type '{}'",
                i, name, other
            )))
        }
    };

    Ok(Some(Region::new(name, multi)))
}

fn parse_polygon(value: &Value) -> std::result::Result<Polygon<f64>, String> {
    let rings = value.as_array().ok_or("polygon is not an array of rings")?;
    let mut rings = rings.iter().map(parse_ring);
    let exterior = rings.next().ok_or("polygon has no rings")??;
    let interiors = rings.collect::<std::result::Result<Vec<_>, String>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(value: &Value) -> std::result::Result<LineString<f64>, String> {
    let positions = value.as_array().ok_or("ring is not an array of positions")?;
    if positions.len() < 3 {
        return Err(format!("ring has {} positions, need at least 3", positions.len()));
    }

    positions
        .iter()
        .map(|pos| {
            let x = pos.get(0).and_then(Value::as_f64);
            let y = pos.get(1).and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
                _ => Err(format!("invalid position {}", pos)),
            }
        })
        .collect::<std::result::Result<Vec<_>, String>>()
        .map(LineString::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(name: &str, min_lng: f64, min_lat: f64, size: f64) -> Region {
        Region::rectangle(
            name,
            Bounds {
                min_lat,
                max_lat: min_lat + size,
                min_lng,
                max_lng: min_lng + size,
            },
        )
    }

    #[test]
    fn test_label_inside_and_outside() {
        let index = RegionIndex::build(vec![
            square("A", 0.0, 0.0, 1.0),
            square("B", 1.0, 0.0, 1.0),
        ])
        .unwrap();

        assert_eq!(index.label(&GpsPoint::new(0.5, 0.5)), Some("A"));
        assert_eq!(index.label(&GpsPoint::new(0.5, 1.5)), Some("B"));
        assert_eq!(index.label(&GpsPoint::new(3.0, 3.0)), None);
    }

    #[test]
    fn test_boundary_is_outside() {
        let index = RegionIndex::build(vec![square("A", 0.0, 0.0, 1.0)]).unwrap();
        assert_eq!(index.label(&GpsPoint::new(0.0, 0.5)), None);
        assert_eq!(index.label(&GpsPoint::new(1.0, 1.0)), None);
    }

    #[test]
    fn test_overlap_prefers_smallest_area() {
        let index = RegionIndex::build(vec![
            square("Oblast", 0.0, 0.0, 10.0),
            square("City", 2.0, 2.0, 1.0),
        ])
        .unwrap();

        assert_eq!(index.label(&GpsPoint::new(2.5, 2.5)), Some("City"));
        assert_eq!(index.label(&GpsPoint::new(5.0, 5.0)), Some("Oblast"));
    }

    #[test]
    fn test_equal_area_overlap_prefers_input_order() {
        let index = RegionIndex::build(vec![
            square("First", 0.0, 0.0, 1.0),
            square("Second", 0.0, 0.0, 1.0),
        ])
        .unwrap();
        assert_eq!(index.label(&GpsPoint::new(0.5, 0.5)), Some("First"));
    }

    #[test]
    fn test_invalid_points_yield_none() {
        let index = RegionIndex::build(vec![square("A", -1.0, -1.0, 2.0)]).unwrap();
        assert_eq!(index.label(&GpsPoint::new(f64::NAN, 0.0)), None);
        assert_eq!(index.label(&GpsPoint::new(0.0, f64::INFINITY)), None);
    }

    #[test]
    fn test_empty_dataset_is_error() {
        assert!(matches!(
            RegionIndex::build(vec![]),
            Err(TrackError::InvalidRegionDataset(_))
        ));
    }

    #[test]
    fn test_geojson_name_fallbacks() {
        let ring = json!([[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]);
        let data = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "shapeName": "Primary", "name": "Ignored" },
                  "geometry": { "type": "Polygon", "coordinates": ring } },
                { "type": "Feature", "properties": { "name": "Fallback" },
                  "geometry": { "type": "MultiPolygon", "coordinates": [ring] } },
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Polygon", "coordinates": ring } },
                { "type": "Feature", "properties": { "name": "Nowhere" }, "geometry": null }
            ]
        });

        let regions = regions_from_geojson(&data).unwrap();
        let names: Vec<&str> = regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Primary", "Fallback", ""]);
    }

    #[test]
    fn test_geojson_malformed_geometry_is_fatal() {
        let data = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "name": "Bad" },
                  "geometry": { "type": "Polygon", "coordinates": [[[0.0, 0.0], ["x", 1.0]]] } }
            ]
        });
        assert!(RegionIndex::from_geojson_value(&data).is_err());

        let point = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {},
                  "geometry": { "type": "Point", "coordinates": [0.0, 0.0] } }
            ]
        });
        assert!(RegionIndex::from_geojson_value(&point).is_err());
        assert!(RegionIndex::from_geojson_str("{\"type\": \"Feature\"}").is_err());
    }

    #[test]
    fn test_index_with_many_regions() {
        // 20x20 grid of 0.1-degree cells
        let regions: Vec<Region> = (0..400)
            .map(|i| {
                let row = (i / 20) as f64;
                let col = (i % 20) as f64;
                square(&format!("cell-{}", i), col * 0.1, row * 0.1, 0.1)
            })
            .collect();
        let index = RegionIndex::build(regions).unwrap();

        assert_eq!(index.len(), 400);
        // Row 3, column 7
        assert_eq!(index.label(&GpsPoint::new(0.35, 0.75)), Some("cell-67"));
        assert!(index.get("cell-399").is_some());
    }
}
