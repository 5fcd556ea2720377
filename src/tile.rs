//! Tile addressing, tile boxes in world units, and the tile output model.

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use std::sync::Arc;

use crate::geometry::Properties;
use crate::project::WORLD_EXTENT;

/// Deepest addressable zoom: columns and rows are u32, so the grid tops
/// out at 2^32 per axis.
pub const MAX_ZOOM: u8 = 32;

/// A tile address: zoom plus column/row, with `0 <= x, y < 2^z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileAddress {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Whether this address is inside the tile grid: z within the
    /// addressable range and x, y inside that zoom's grid.
    pub fn in_grid(&self) -> bool {
        if self.z > MAX_ZOOM {
            return false;
        }
        let n = 1u64 << self.z;
        (self.x as u64) < n && (self.y as u64) < n
    }

    /// Side length of this tile in world units.
    pub fn span(&self) -> f64 {
        WORLD_EXTENT / (1u64 << self.z.min(MAX_ZOOM)) as f64
    }

    /// The tile's exact box in world units.
    pub fn world_box(&self) -> WorldBox {
        let span = self.span();
        let min_x = self.x as f64 * span;
        let min_y = self.y as f64 * span;
        WorldBox::new(min_x, min_y, min_x + span, min_y + span)
    }
}

impl std::fmt::Display for TileAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "z{}/x{}/y{}", self.z, self.x, self.y)
    }
}

/// An axis-aligned rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl WorldBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// An inverted box that any `expand` call will overwrite.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    /// Grow to include another box.
    pub fn expand(&mut self, other: &Self) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Grow outward by `margin` world units on every side.
    pub fn buffered(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn contains(&self, coord: &Coord<f64>) -> bool {
        coord.x >= self.min_x
            && coord.x <= self.max_x
            && coord.y >= self.min_y
            && coord.y <= self.max_y
    }

    /// Whether `other` lies entirely inside this box.
    pub fn covers(&self, other: &Self) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }
}

/// One clipped feature inside a tile: geometry in tile-local pixel
/// coordinates plus the originating feature's properties.
#[derive(Debug, Clone)]
pub struct TileFeature {
    pub geometry: Geometry<f64>,
    pub properties: Arc<Properties>,
}

/// The result of clipping a collection to one tile address.
///
/// Features appear in their original collection order. Coordinates are
/// expressed in the tile's local [0, extent) pixel space (buffered geometry
/// may extend slightly past either end). A `Tile` is immutable once built
/// and independent of the cache that produced it.
#[derive(Debug, Clone)]
pub struct Tile {
    pub address: TileAddress,
    pub extent: u32,
    pub features: Vec<TileFeature>,
}

impl Tile {
    /// A tile with no intersecting geometry.
    pub fn empty(address: TileAddress, extent: u32) -> Self {
        Self {
            address,
            extent,
            features: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Rebase a world-unit geometry into a tile's local pixel space:
/// `local = (world - tile_origin) / span * extent`.
pub fn to_local(geom: &Geometry<f64>, address: &TileAddress, extent: u32) -> Geometry<f64> {
    let tile_box = address.world_box();
    let scale = extent as f64 / address.span();
    let rebase = |c: &Coord<f64>| Coord {
        x: (c.x - tile_box.min_x) * scale,
        y: (c.y - tile_box.min_y) * scale,
    };

    map_coords(geom, &rebase)
}

fn map_coords<F>(geom: &Geometry<f64>, f: &F) -> Geometry<f64>
where
    F: Fn(&Coord<f64>) -> Coord<f64>,
{
    let map_ls = |ls: &LineString<f64>| LineString::new(ls.0.iter().map(f).collect());
    let map_poly = |poly: &Polygon<f64>| {
        Polygon::new(
            map_ls(poly.exterior()),
            poly.interiors().iter().map(map_ls).collect(),
        )
    };

    match geom {
        Geometry::Point(p) => Geometry::Point(Point(f(&p.0))),
        Geometry::MultiPoint(mp) => Geometry::MultiPoint(geo::MultiPoint::new(
            mp.0.iter().map(|p| Point(f(&p.0))).collect(),
        )),
        Geometry::LineString(ls) => Geometry::LineString(map_ls(ls)),
        Geometry::MultiLineString(mls) => {
            Geometry::MultiLineString(MultiLineString::new(mls.0.iter().map(map_ls).collect()))
        }
        Geometry::Polygon(poly) => Geometry::Polygon(map_poly(poly)),
        Geometry::MultiPolygon(mp) => {
            Geometry::MultiPolygon(MultiPolygon::new(mp.0.iter().map(map_poly).collect()))
        }
        other => other.clone(),
    }
}
