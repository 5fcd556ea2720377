//! Geometry clipping to buffered tile boxes.
//!
//! Clips world-unit geometry against a tile's box expanded by a small buffer
//! so geometry that barely crosses a tile edge does not leave visible seams
//! between adjacent tiles. Polygons go through a Sutherland–Hodgman
//! sequential half-plane clip (left, right, top, bottom) that re-closes
//! rings along the box edge; lines are clipped with a rectangle boolean op
//! and may split into several disjoint parts; points are a containment test.
//!
//! Degenerate results — rings under 4 coordinates, zero-area polygons,
//! single-point line fragments — are dropped, never returned.

use geo::{
    line_intersection::{line_intersection, LineIntersection},
    Area, BooleanOps, BoundingRect, Coord, Geometry, Line, LineString, MultiLineString,
    MultiPolygon, Point, Polygon, Rect,
};

use crate::geometry::{MIN_LINE_COORDS, MIN_RING_COORDS};
use crate::tile::WorldBox;

/// Fraction of the clip box's area below which a clipped polygon is treated
/// as degenerate. Scale-relative so that one-ulp slivers left by projection
/// round-off are dropped at every zoom, while anything remotely visible
/// (the threshold is well under a millionth of a square pixel) survives.
const MIN_AREA_RATIO: f64 = 1e-12;

fn degenerate_area(clip_box: &WorldBox) -> f64 {
    let area = (clip_box.max_x - clip_box.min_x) * (clip_box.max_y - clip_box.min_y);
    (area * MIN_AREA_RATIO).max(f64::MIN_POSITIVE)
}

/// Clip a geometry to a buffered tile box.
///
/// Returns `None` when nothing of the geometry intersects the box — an
/// expected outcome, not an error. Returned coordinates never lie outside
/// the box.
pub fn clip_geometry(geom: &Geometry<f64>, clip_box: &WorldBox) -> Option<Geometry<f64>> {
    match geom {
        Geometry::Point(p) => clip_point(p, clip_box).map(Geometry::Point),
        Geometry::MultiPoint(mp) => {
            let points: Vec<Point<f64>> =
                mp.0.iter()
                    .filter_map(|p| clip_point(p, clip_box))
                    .collect();
            match points.len() {
                0 => None,
                1 => Some(Geometry::Point(points[0])),
                _ => Some(Geometry::MultiPoint(geo::MultiPoint::new(points))),
            }
        }
        Geometry::LineString(ls) => {
            clip_lines(&MultiLineString::new(vec![ls.clone()]), clip_box)
        }
        Geometry::MultiLineString(mls) => clip_lines(mls, clip_box),
        Geometry::Polygon(poly) => clip_polygon(poly, clip_box),
        Geometry::MultiPolygon(mp) => clip_multipolygon(mp, clip_box),
        other => {
            // Ingestion rejects other variants; bbox-test defensively.
            let rect = other.bounding_rect()?;
            if clip_box.intersects(&rect_to_box(&rect)) {
                Some(other.clone())
            } else {
                None
            }
        }
    }
}

fn rect_to_box(rect: &Rect<f64>) -> WorldBox {
    WorldBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
}

fn box_to_rect(b: &WorldBox) -> Rect<f64> {
    Rect::new(
        Coord {
            x: b.min_x,
            y: b.min_y,
        },
        Coord {
            x: b.max_x,
            y: b.max_y,
        },
    )
}

fn clip_point(point: &Point<f64>, clip_box: &WorldBox) -> Option<Point<f64>> {
    if clip_box.contains(&point.0) {
        Some(*point)
    } else {
        None
    }
}

/// Clip lines with a rectangle boolean op. A line that leaves and re-enters
/// the box splits into disjoint parts, each emitted as its own linestring.
fn clip_lines(mls: &MultiLineString<f64>, clip_box: &WorldBox) -> Option<Geometry<f64>> {
    let rect = mls.bounding_rect()?;
    if !clip_box.intersects(&rect_to_box(&rect)) {
        return None;
    }

    let clip_poly = box_to_rect(clip_box).to_polygon();
    let mut clipped = clip_poly.clip(mls, false);
    // The boolean clip quantizes coordinates internally, so cut points can
    // land a hair outside the box; snap them back onto it.
    for ls in &mut clipped.0 {
        for c in &mut ls.0 {
            c.x = c.x.clamp(clip_box.min_x, clip_box.max_x);
            c.y = c.y.clamp(clip_box.min_y, clip_box.max_y);
        }
    }
    clipped.0.retain(|ls| ls.0.len() >= MIN_LINE_COORDS);

    match clipped.0.len() {
        0 => None,
        1 => Some(Geometry::LineString(clipped.0.into_iter().next().unwrap())),
        _ => Some(Geometry::MultiLineString(clipped)),
    }
}

fn clip_polygon(poly: &Polygon<f64>, clip_box: &WorldBox) -> Option<Geometry<f64>> {
    let poly_box = rect_to_box(&poly.bounding_rect()?);
    if !clip_box.intersects(&poly_box) {
        return None;
    }

    // Fully inside: nothing to cut.
    if clip_box.covers(&poly_box) {
        return Some(Geometry::Polygon(poly.clone()));
    }

    if polygon_self_intersects(poly) {
        // Sutherland-Hodgman assumes simple rings; degenerate input goes
        // through the slower boolean intersection instead.
        log::trace!("self-intersecting polygon, clipping via boolean op");
        return clip_polygon_boolean(poly, clip_box);
    }

    let exterior = clip_ring(poly.exterior(), clip_box);
    if exterior.0.len() < MIN_RING_COORDS {
        return None;
    }

    let interiors: Vec<LineString<f64>> = poly
        .interiors()
        .iter()
        .map(|ring| clip_ring(ring, clip_box))
        .filter(|ring| ring.0.len() >= MIN_RING_COORDS)
        .collect();

    let clipped = Polygon::new(exterior, interiors);
    if clipped.unsigned_area() < degenerate_area(clip_box) {
        return None;
    }
    Some(Geometry::Polygon(clipped))
}

/// Boolean-op fallback for polygons Sutherland-Hodgman cannot handle.
/// May legitimately produce multiple parts (a U-shape cut across its opening).
fn clip_polygon_boolean(poly: &Polygon<f64>, clip_box: &WorldBox) -> Option<Geometry<f64>> {
    let clip_poly = box_to_rect(clip_box).to_polygon();
    let mut result: MultiPolygon<f64> = poly.intersection(&clip_poly);
    let min_area = degenerate_area(clip_box);
    result.0.retain(|p| p.unsigned_area() >= min_area);

    match result.0.len() {
        0 => None,
        1 => Some(Geometry::Polygon(result.0.into_iter().next().unwrap())),
        _ => Some(Geometry::MultiPolygon(result)),
    }
}

fn clip_multipolygon(mp: &MultiPolygon<f64>, clip_box: &WorldBox) -> Option<Geometry<f64>> {
    let mp_box = rect_to_box(&mp.bounding_rect()?);
    if !clip_box.intersects(&mp_box) {
        return None;
    }
    if clip_box.covers(&mp_box) {
        return Some(Geometry::MultiPolygon(mp.clone()));
    }

    let mut parts = Vec::new();
    for poly in &mp.0 {
        match clip_polygon(poly, clip_box) {
            Some(Geometry::Polygon(p)) => parts.push(p),
            Some(Geometry::MultiPolygon(more)) => parts.extend(more.0),
            _ => {}
        }
    }

    match parts.len() {
        0 => None,
        1 => Some(Geometry::Polygon(parts.into_iter().next().unwrap())),
        _ => Some(Geometry::MultiPolygon(MultiPolygon::new(parts))),
    }
}

/// Sutherland-Hodgman clip of one ring against an axis-aligned box,
/// one half-plane at a time. O(n), and the output ring is re-closed.
fn clip_ring(ring: &LineString<f64>, b: &WorldBox) -> LineString<f64> {
    let mut output: Vec<Coord<f64>> = ring.0.clone();

    // Left edge
    output = clip_half_plane(
        &output,
        |c| c.x >= b.min_x,
        |c1, c2| {
            let t = (b.min_x - c1.x) / (c2.x - c1.x);
            Coord {
                x: b.min_x,
                y: c1.y + t * (c2.y - c1.y),
            }
        },
    );
    // Right edge
    output = clip_half_plane(
        &output,
        |c| c.x <= b.max_x,
        |c1, c2| {
            let t = (b.max_x - c1.x) / (c2.x - c1.x);
            Coord {
                x: b.max_x,
                y: c1.y + t * (c2.y - c1.y),
            }
        },
    );
    // Top edge (smaller y is north in world units)
    output = clip_half_plane(
        &output,
        |c| c.y >= b.min_y,
        |c1, c2| {
            let t = (b.min_y - c1.y) / (c2.y - c1.y);
            Coord {
                x: c1.x + t * (c2.x - c1.x),
                y: b.min_y,
            }
        },
    );
    // Bottom edge
    output = clip_half_plane(
        &output,
        |c| c.y <= b.max_y,
        |c1, c2| {
            let t = (b.max_y - c1.y) / (c2.y - c1.y);
            Coord {
                x: c1.x + t * (c2.x - c1.x),
                y: b.max_y,
            }
        },
    );

    if !output.is_empty() && output.first() != output.last() {
        output.push(output[0]);
    }

    LineString::new(output)
}

fn clip_half_plane<F, I>(vertices: &[Coord<f64>], inside: F, intersect: I) -> Vec<Coord<f64>>
where
    F: Fn(&Coord<f64>) -> bool,
    I: Fn(&Coord<f64>, &Coord<f64>) -> Coord<f64>,
{
    if vertices.is_empty() {
        return Vec::new();
    }

    let mut output = Vec::with_capacity(vertices.len());

    for i in 0..vertices.len() {
        let current = &vertices[i];
        let next = &vertices[(i + 1) % vertices.len()];

        let current_inside = inside(current);
        let next_inside = inside(next);

        if current_inside {
            output.push(*current);
            if !next_inside {
                output.push(intersect(current, next));
            }
        } else if next_inside {
            output.push(intersect(current, next));
        }
    }

    output
}

/// Whether any ring of the polygon crosses itself (bowtie) or touches
/// itself at a repeated vertex (spike). O(n²) edge-pair test; only run when
/// a polygon actually straddles the clip box.
fn polygon_self_intersects(poly: &Polygon<f64>) -> bool {
    std::iter::once(poly.exterior())
        .chain(poly.interiors().iter())
        .any(ring_self_intersects)
}

fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let coords = &ring.0;
    let n = coords.len();
    if n < 4 {
        return false;
    }

    // Skip the closing coordinate so the wrap-around edge is not duplicated.
    let num_edges = if coords.first() == coords.last() {
        n - 1
    } else {
        n
    };

    // Repeated vertex at non-adjacent positions: the ring touches itself.
    for i in 0..num_edges {
        for j in (i + 2)..num_edges {
            if i == 0 && j == num_edges - 1 {
                continue;
            }
            if coords[i] == coords[j] {
                return true;
            }
        }
    }

    // Proper crossing between non-adjacent edges.
    for i in 0..num_edges {
        let edge_i = Line::new(coords[i], coords[(i + 1) % n]);
        for j in (i + 2)..num_edges {
            if i == 0 && j == num_edges - 1 {
                continue;
            }
            let edge_j = Line::new(coords[j], coords[(j + 1) % n]);

            match line_intersection(edge_i, edge_j) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    let at_endpoint_i = intersection == edge_i.start || intersection == edge_i.end;
                    let at_endpoint_j = intersection == edge_j.start || intersection == edge_j.end;
                    if !(at_endpoint_i && at_endpoint_j) {
                        return true;
                    }
                }
                Some(LineIntersection::Collinear { .. }) => return true,
                None => {}
            }
        }
    }

    false
}
