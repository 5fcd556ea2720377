//! Web Mercator projection into a fixed world coordinate plane.
//!
//! All clipping and simplification happens in "world units": a plane of
//! [0, 2^32) covering the whole world at the engine's base precision, with
//! x increasing eastward and y increasing southward. Working at a fixed base
//! resolution makes numeric tolerances resolution-independent — a 1-pixel
//! tolerance at zoom z is the same fraction of a tile everywhere on the
//! globe. Coordinates stay f64 so clip-edge interpolation is exact.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use std::f64::consts::PI;

/// Width and height of the world plane: 2^32 units at zoom 0.
pub const WORLD_EXTENT: f64 = 4294967296.0;

/// Latitude limit of the Web Mercator projection, in degrees.
pub const MERCATOR_MAX_LAT: f64 = 85.05112878;

/// Project a lon/lat coordinate into world units.
///
/// Equirectangular in longitude, logarithmic in latitude (EPSG:3857 shape).
/// Latitudes beyond the Mercator limit are clamped and longitudes wrapped
/// into [-180, 180] — lossy but deterministic, mirroring standard slippy-map
/// practice rather than rejecting polar input.
pub fn project(lng: f64, lat: f64) -> Coord<f64> {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let lng = if lng < -180.0 || lng > 180.0 {
        (lng + 180.0).rem_euclid(360.0) - 180.0
    } else {
        lng
    };

    let lat_rad = lat.to_radians();
    let x = (lng + 180.0) / 360.0 * WORLD_EXTENT;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * WORLD_EXTENT;

    Coord { x, y }
}

/// Invert [`project`]: world units back to (lng, lat) degrees.
pub fn unproject(coord: Coord<f64>) -> (f64, f64) {
    let lng = coord.x / WORLD_EXTENT * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * coord.y / WORLD_EXTENT);
    let lat = n.sinh().atan().to_degrees();
    (lng, lat)
}

/// Project an entire geometry, coordinate by coordinate.
///
/// Runs once per feature at load time; the result is retained for the
/// session's lifetime.
pub fn project_geometry(geom: &Geometry<f64>) -> Geometry<f64> {
    match geom {
        Geometry::Point(p) => Geometry::Point(Point(project(p.x(), p.y()))),
        Geometry::MultiPoint(mp) => Geometry::MultiPoint(geo::MultiPoint::new(
            mp.0.iter().map(|p| Point(project(p.x(), p.y()))).collect(),
        )),
        Geometry::LineString(ls) => Geometry::LineString(project_linestring(ls)),
        Geometry::MultiLineString(mls) => Geometry::MultiLineString(MultiLineString::new(
            mls.0.iter().map(project_linestring).collect(),
        )),
        Geometry::Polygon(poly) => Geometry::Polygon(project_polygon(poly)),
        Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon::new(
            mp.0.iter().map(project_polygon).collect(),
        )),
        // Ingestion validation rejects everything else.
        other => other.clone(),
    }
}

fn project_linestring(ls: &LineString<f64>) -> LineString<f64> {
    LineString::new(ls.0.iter().map(|c| project(c.x, c.y)).collect())
}

fn project_polygon(poly: &Polygon<f64>) -> Polygon<f64> {
    Polygon::new(
        project_linestring(poly.exterior()),
        poly.interiors().iter().map(project_linestring).collect(),
    )
}

/// A geographic bounding box in degrees, for viewport fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LngLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LngLatBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Convert a world-unit rectangle back to geographic degrees.
    pub fn from_world(min: Coord<f64>, max: Coord<f64>) -> Self {
        // World y grows southward, so min.y is the northern edge.
        let (west, north) = unproject(min);
        let (east, south) = unproject(max);
        Self {
            west,
            south,
            east,
            north,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_project_origin_is_world_center() {
        let c = project(0.0, 0.0);
        assert!((c.x - WORLD_EXTENT / 2.0).abs() < EPS);
        assert!((c.y - WORLD_EXTENT / 2.0).abs() < EPS);
    }

    #[test]
    fn test_project_west_edge() {
        let c = project(-180.0, 0.0);
        assert!(c.x.abs() < EPS);
    }

    #[test]
    fn test_north_is_smaller_y() {
        let north = project(0.0, 60.0);
        let south = project(0.0, -60.0);
        assert!(north.y < south.y);
    }

    #[test]
    fn test_polar_latitude_clamped() {
        let pole = project(0.0, 90.0);
        let clamp = project(0.0, MERCATOR_MAX_LAT);
        assert!((pole.y - clamp.y).abs() < EPS);
        assert!(pole.y.is_finite());

        // Deterministic: same input, same output.
        let again = project(0.0, 90.0);
        assert_eq!(pole, again);
    }

    #[test]
    fn test_longitude_wrapped() {
        let wrapped = project(190.0, 10.0);
        let direct = project(-170.0, 10.0);
        assert!((wrapped.x - direct.x).abs() < EPS);

        // More than a full revolution away still lands on the same meridian.
        let far = project(550.0, 10.0);
        assert!((far.x - direct.x).abs() < EPS);
        let far_west = project(-550.0, 10.0);
        let east = project(170.0, 10.0);
        assert!((far_west.x - east.x).abs() < EPS);
    }

    #[test]
    fn test_round_trip() {
        for &(lng, lat) in &[
            (0.0, 0.0),
            (-122.4, 37.8),
            (139.7, 35.7),
            (2.35, 48.85),
            (179.9, -84.0),
        ] {
            let (lng2, lat2) = unproject(project(lng, lat));
            assert!(
                (lng - lng2).abs() < 1e-9 && (lat - lat2).abs() < 1e-9,
                "round trip failed for ({}, {}): got ({}, {})",
                lng,
                lat,
                lng2,
                lat2
            );
        }
    }

    #[test]
    fn test_bounds_from_world() {
        let min = project(-10.0, 20.0); // north-west corner in world units
        let max = project(30.0, -5.0); // south-east corner
        let bounds = LngLatBounds::from_world(min, max);

        assert!((bounds.west - (-10.0)).abs() < 1e-9);
        assert!((bounds.north - 20.0).abs() < 1e-9);
        assert!((bounds.east - 30.0).abs() < 1e-9);
        assert!((bounds.south - (-5.0)).abs() < 1e-9);
    }
}
