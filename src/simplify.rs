//! Zoom-derived geometry simplification.
//!
//! Ramer-Douglas-Peucker via `geo::Simplify`, applied to projected geometry
//! with the tolerance expressed in world units. Because the world plane has a
//! fixed base resolution, a pixel tolerance maps to the same on-screen error
//! at every latitude: at zoom z one tile spans `2^32 / 2^z` world units, so
//! one local pixel is `span / extent` world units and the tolerance doubles
//! with every step down in zoom.
//!
//! Simplification runs once per (feature, zoom) pair and is shared across
//! all tiles of that zoom; the session memoizes the result.

use geo::{Geometry, LineString, MultiLineString, MultiPolygon, Polygon, Simplify};

use crate::geometry::MIN_RING_COORDS;
use crate::project::WORLD_EXTENT;
use crate::tile::MAX_ZOOM;

/// Default positional error budget, in tile-local pixels.
pub const DEFAULT_TOLERANCE_PX: f64 = 1.0;

/// Simplification tolerance for a zoom level, in world units.
pub fn tolerance_for_zoom(zoom: u8, extent: u32, tolerance_px: f64) -> f64 {
    let span = WORLD_EXTENT / (1u64 << zoom.min(MAX_ZOOM)) as f64;
    tolerance_px * span / extent as f64
}

/// Simplify a projected geometry for the given zoom level.
///
/// Returns `None` when the geometry degenerates entirely (every polygon ring
/// collapses below 4 coordinates); the feature then contributes nothing at
/// that zoom. Guarantees:
///   - line/ring endpoints are never removed
///   - vertex order, and therefore winding, is preserved
///   - Points and MultiPoints pass through untouched
pub fn simplify_for_zoom(
    geom: &Geometry<f64>,
    zoom: u8,
    extent: u32,
    tolerance_px: f64,
) -> Option<Geometry<f64>> {
    let tolerance = tolerance_for_zoom(zoom, extent, tolerance_px);
    if tolerance <= 0.0 {
        return Some(geom.clone());
    }

    match geom {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Some(geom.clone()),

        Geometry::LineString(ls) => {
            simplify_line(ls, tolerance).map(Geometry::LineString)
        }

        Geometry::MultiLineString(mls) => {
            let lines: Vec<LineString<f64>> = mls
                .0
                .iter()
                .filter_map(|ls| simplify_line(ls, tolerance))
                .collect();
            if lines.is_empty() {
                None
            } else {
                Some(Geometry::MultiLineString(MultiLineString::new(lines)))
            }
        }

        Geometry::Polygon(poly) => simplify_polygon(poly, tolerance).map(Geometry::Polygon),

        Geometry::MultiPolygon(mp) => {
            let polys: Vec<Polygon<f64>> =
                mp.0.iter()
                    .filter_map(|poly| simplify_polygon(poly, tolerance))
                    .collect();
            if polys.is_empty() {
                None
            } else {
                Some(Geometry::MultiPolygon(MultiPolygon::new(polys)))
            }
        }

        other => Some(other.clone()),
    }
}

fn simplify_line(ls: &LineString<f64>, tolerance: f64) -> Option<LineString<f64>> {
    if ls.0.len() < 2 {
        return None;
    }
    Some(ls.simplify(&tolerance))
}

/// Simplify a polygon's rings, dropping any that degenerate.
///
/// A hole collapsing below [`MIN_RING_COORDS`] is dropped alone; the
/// exterior collapsing drops the whole polygon.
fn simplify_polygon(poly: &Polygon<f64>, tolerance: f64) -> Option<Polygon<f64>> {
    let exterior = poly.exterior().simplify(&tolerance);
    if exterior.0.len() < MIN_RING_COORDS {
        return None;
    }

    let interiors: Vec<LineString<f64>> = poly
        .interiors()
        .iter()
        .map(|ring| ring.simplify(&tolerance))
        .filter(|ring| ring.0.len() >= MIN_RING_COORDS)
        .collect();

    Some(Polygon::new(exterior, interiors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn zigzag(n: usize, dx: f64, dy: f64) -> LineString<f64> {
        LineString::new(
            (0..n)
                .map(|i| Coord {
                    x: i as f64 * dx,
                    y: if i % 2 == 0 { 0.0 } else { dy },
                })
                .collect(),
        )
    }

    #[test]
    fn test_tolerance_doubles_per_zoom_step() {
        let t5 = tolerance_for_zoom(5, 4096, 1.0);
        let t6 = tolerance_for_zoom(6, 4096, 1.0);
        assert_eq!(t5, t6 * 2.0);
    }

    #[test]
    fn test_tolerance_scales_with_pixel_budget() {
        let one = tolerance_for_zoom(3, 4096, 1.0);
        let three = tolerance_for_zoom(3, 4096, 3.0);
        assert_eq!(three, one * 3.0);
    }

    #[test]
    fn test_coarse_zoom_drops_vertices() {
        // Oscillations of ~100 world units vanish at z0 (1px ≈ 1M units)
        // but survive at z20 (1px ≈ 1 unit).
        let line = zigzag(50, 1000.0, 100.0);
        let geom = Geometry::LineString(line.clone());

        let coarse = simplify_for_zoom(&geom, 0, 4096, 1.0).unwrap();
        let fine = simplify_for_zoom(&geom, 20, 4096, 1.0).unwrap();

        let count = |g: &Geometry<f64>| match g {
            Geometry::LineString(ls) => ls.0.len(),
            _ => panic!("expected linestring"),
        };

        assert!(count(&coarse) < line.0.len());
        assert_eq!(count(&fine), line.0.len());
    }

    #[test]
    fn test_monotonic_vertex_count_across_zooms() {
        let geom = Geometry::LineString(zigzag(80, 500_000.0, 200_000.0));

        let mut prev = 0usize;
        for zoom in 0..=12u8 {
            let simplified = simplify_for_zoom(&geom, zoom, 4096, 1.0).unwrap();
            let n = match simplified {
                Geometry::LineString(ls) => ls.0.len(),
                _ => panic!("expected linestring"),
            };
            assert!(
                n >= prev,
                "vertex count decreased from {} to {} at zoom {}",
                prev,
                n,
                zoom
            );
            prev = n;
        }
    }

    #[test]
    fn test_endpoints_survive() {
        let line = zigzag(30, 10.0, 5.0);
        let first = line.0[0];
        let last = *line.0.last().unwrap();

        let simplified = simplify_for_zoom(&Geometry::LineString(line), 0, 4096, 1.0).unwrap();
        match simplified {
            Geometry::LineString(ls) => {
                assert_eq!(ls.0[0], first);
                assert_eq!(*ls.0.last().unwrap(), last);
            }
            _ => panic!("expected linestring"),
        }
    }

    #[test]
    fn test_points_pass_through() {
        let p = Geometry::Point(geo::point!(x: 123.0, y: 456.0));
        assert_eq!(simplify_for_zoom(&p, 0, 4096, 1.0).unwrap(), p);
    }

    #[test]
    fn test_tiny_ring_degenerates_to_none() {
        // A sliver far below one pixel at z0 collapses entirely.
        let poly = Polygon::new(
            LineString::from(vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 10.0, y: 0.1 },
                Coord { x: 20.0, y: 0.0 },
                Coord { x: 10.0, y: -0.1 },
                Coord { x: 0.0, y: 0.0 },
            ]),
            vec![],
        );
        let result = simplify_for_zoom(&Geometry::Polygon(poly), 0, 4096, 1.0);
        assert!(result.is_none(), "sub-pixel sliver should contribute nothing");
    }

    #[test]
    fn test_collapsed_hole_dropped_but_shell_kept() {
        let shell = LineString::from(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 4_000_000.0, y: 0.0 },
            Coord { x: 4_000_000.0, y: 4_000_000.0 },
            Coord { x: 0.0, y: 4_000_000.0 },
            Coord { x: 0.0, y: 0.0 },
        ]);
        // Hole far below z0 pixel size.
        let hole = LineString::from(vec![
            Coord { x: 100.0, y: 100.0 },
            Coord { x: 110.0, y: 100.0 },
            Coord { x: 110.0, y: 110.0 },
            Coord { x: 100.0, y: 110.0 },
            Coord { x: 100.0, y: 100.0 },
        ]);
        let poly = Polygon::new(shell, vec![hole]);

        match simplify_for_zoom(&Geometry::Polygon(poly), 0, 4096, 1.0) {
            Some(Geometry::Polygon(p)) => assert!(p.interiors().is_empty()),
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_winding_preserved() {
        use geo::Area;

        let ccw: Polygon<f64> = Polygon::new(
            LineString::from(vec![
                Coord { x: 0.0, y: 0.0 },
                Coord { x: 4_000_000.0, y: 0.0 },
                Coord { x: 4_100_000.0, y: 2_000_000.0 },
                Coord { x: 4_000_000.0, y: 4_000_000.0 },
                Coord { x: 0.0, y: 4_000_000.0 },
                Coord { x: 0.0, y: 0.0 },
            ]),
            vec![],
        );
        let sign = ccw.signed_area().signum();

        match simplify_for_zoom(&Geometry::Polygon(ccw), 4, 4096, 1.0) {
            Some(Geometry::Polygon(p)) => {
                assert_eq!(p.signed_area().signum(), sign);
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }
}
