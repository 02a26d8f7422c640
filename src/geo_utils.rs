//! # Geographic Utilities
//!
//! Distance helpers shared by the analysis modules.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`planar_distance`] | Euclidean distance in raw degree space |
//! | [`polyline_length`] | Total length of a GPS track in meters |
//!
//! ## Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees).
//! `geo` types are built in (x = longitude, y = latitude) order.

use geo::{Distance, Haversine, Point};

use crate::GpsPoint;

#[inline]
fn to_point(p: &GpsPoint) -> Point<f64> {
    Point::new(p.longitude, p.latitude)
}

/// Calculate the great-circle distance between two GPS points in meters.
///
/// # Example
///
/// ```rust
/// use region_dwell::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    Haversine::distance(to_point(p1), to_point(p2))
}

/// Euclidean distance between two points treated as planar (lon, lat) pairs.
///
/// The result is in degrees. This is only meaningful as a "same place"
/// test with a small tolerance, which is how trip-gap dwell pairing uses it.
#[inline]
pub fn planar_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    (p1.longitude - p2.longitude).hypot(p1.latitude - p2.latitude)
}

/// Total length of a polyline (GPS track) in meters.
///
/// Empty or single-point tracks return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(51.1282, 71.4304);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_planar_distance() {
        let a = GpsPoint::new(10.0, 20.0);
        let b = GpsPoint::new(10.00005, 20.00005);
        assert!(approx_eq(planar_distance(&a, &b), 7.0711e-5, 1e-8));
    }

    #[test]
    fn test_polyline_length() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[GpsPoint::new(51.5, -0.1)]), 0.0);

        // 0.001 degrees of latitude is ~111m
        let track = vec![
            GpsPoint::new(51.500, -0.1278),
            GpsPoint::new(51.501, -0.1278),
            GpsPoint::new(51.502, -0.1278),
        ];
        assert!(approx_eq(polyline_length(&track), 222.4, 2.0));
    }
}
