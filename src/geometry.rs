//! Feature model and ingestion-boundary validation.
//!
//! The engine never sees invalid geometry: malformed features (rings with
//! fewer than 4 points, empty coordinate sequences, non-finite coordinates)
//! are rejected here with the offending feature index, and the whole load
//! aborts so callers observe one consistent collection or none.
//!
//! Polygon winding is normalized at this boundary (exterior rings
//! counter-clockwise, holes clockwise) so downstream clipping can rely on it.

use geo::orient::{Direction, Orient};
use geo::{Geometry, LineString, MultiPolygon, Polygon};
use serde_json::Value;

use crate::{Error, Result};

/// Per-feature properties, carried through clipping untouched.
pub type Properties = serde_json::Map<String, Value>;

/// An immutable feature: geometry plus arbitrary properties.
///
/// Supported geometry variants are Point, MultiPoint, LineString,
/// MultiLineString, Polygon and MultiPolygon; anything else is rejected
/// at ingestion.
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub properties: Properties,
}

impl Feature {
    /// Create a feature with empty properties.
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry,
            properties: Properties::new(),
        }
    }

    /// Create a feature with the given properties.
    pub fn with_properties(geometry: Geometry<f64>, properties: Properties) -> Self {
        Self {
            geometry,
            properties,
        }
    }
}

/// An ordered sequence of features. Order is preserved through clipping:
/// it is the caller-visible paint order for overlapping features.
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection(pub Vec<Feature>);

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self(features)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Minimum coordinates for a closed polygon ring (3 distinct + closing point).
pub const MIN_RING_COORDS: usize = 4;

/// Minimum coordinates for a linestring.
pub const MIN_LINE_COORDS: usize = 2;

/// Validate every feature and normalize polygon winding in place.
///
/// Returns the first violation as [`Error::MalformedGeometry`] identifying
/// the feature index; on success all polygons have exterior rings wound
/// counter-clockwise and holes clockwise.
pub fn validate_collection(collection: &mut FeatureCollection) -> Result<()> {
    for (index, feature) in collection.0.iter_mut().enumerate() {
        validate_feature_geometry(&feature.geometry).map_err(|reason| {
            Error::MalformedGeometry {
                feature_index: index,
                reason,
            }
        })?;
        normalize_winding(&mut feature.geometry);
    }
    Ok(())
}

/// Check one geometry; the error string names what is wrong.
fn validate_feature_geometry(geom: &Geometry<f64>) -> std::result::Result<(), String> {
    match geom {
        Geometry::Point(p) => {
            if !p.x().is_finite() || !p.y().is_finite() {
                return Err("point has non-finite coordinates".to_string());
            }
            Ok(())
        }
        Geometry::MultiPoint(mp) => {
            if mp.0.is_empty() {
                return Err("multipoint has no points".to_string());
            }
            for (i, p) in mp.0.iter().enumerate() {
                if !p.x().is_finite() || !p.y().is_finite() {
                    return Err(format!("multipoint has non-finite coordinate at index {}", i));
                }
            }
            Ok(())
        }
        Geometry::LineString(ls) => validate_linestring(ls, "linestring"),
        Geometry::MultiLineString(mls) => {
            if mls.0.is_empty() {
                return Err("multilinestring has no linestrings".to_string());
            }
            for (i, ls) in mls.0.iter().enumerate() {
                validate_linestring(ls, &format!("linestring at index {}", i))?;
            }
            Ok(())
        }
        Geometry::Polygon(poly) => validate_polygon(poly),
        Geometry::MultiPolygon(mp) => {
            if mp.0.is_empty() {
                return Err("multipolygon has no polygons".to_string());
            }
            for (i, poly) in mp.0.iter().enumerate() {
                validate_polygon(poly)
                    .map_err(|e| format!("polygon at index {}: {}", i, e))?;
            }
            Ok(())
        }
        other => Err(format!("unsupported geometry type: {}", geometry_name(other))),
    }
}

fn validate_linestring(ls: &LineString<f64>, name: &str) -> std::result::Result<(), String> {
    if ls.0.len() < MIN_LINE_COORDS {
        return Err(format!(
            "{} must have at least {} points, has {}",
            name,
            MIN_LINE_COORDS,
            ls.0.len()
        ));
    }
    for (i, coord) in ls.0.iter().enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Err(format!("{} has non-finite coordinate at index {}", name, i));
        }
    }
    Ok(())
}

fn validate_polygon(poly: &Polygon<f64>) -> std::result::Result<(), String> {
    validate_ring(poly.exterior(), "exterior ring")?;
    for (i, interior) in poly.interiors().iter().enumerate() {
        validate_ring(interior, &format!("interior ring at index {}", i))?;
    }
    Ok(())
}

fn validate_ring(ring: &LineString<f64>, name: &str) -> std::result::Result<(), String> {
    if ring.0.len() < MIN_RING_COORDS {
        return Err(format!(
            "{} must have at least {} coordinates, has {}",
            name,
            MIN_RING_COORDS,
            ring.0.len()
        ));
    }
    for (i, coord) in ring.0.iter().enumerate() {
        if !coord.x.is_finite() || !coord.y.is_finite() {
            return Err(format!("{} has non-finite coordinate at index {}", name, i));
        }
    }
    Ok(())
}

/// Rewind polygon rings to the fixed convention: exterior counter-clockwise,
/// holes clockwise. Lossless and idempotent; non-areal geometry is untouched.
fn normalize_winding(geom: &mut Geometry<f64>) {
    match geom {
        Geometry::Polygon(poly) => {
            *poly = poly.orient(Direction::Default);
        }
        Geometry::MultiPolygon(mp) => {
            *mp = MultiPolygon::new(
                mp.0.iter()
                    .map(|poly| poly.orient(Direction::Default))
                    .collect(),
            );
        }
        _ => {}
    }
}

fn geometry_name(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
