/*!

Planar polygon helpers for zones, built on `geo`'s boolean operations.

A zone's shape is a `MultiPolygon`. After every update it has no interior rings, so each member
polygon is exactly one contour and a contour index is a position in `MultiPolygon::0`.

*/

use crate::log::{trace, warn};
use geo::{Area, BooleanOps, Coord, Intersects, LineString, MultiPolygon, Point, Polygon};
use std::f64::consts::PI;

/// Distance tolerance in kilometres (10 m).
pub const EPSILON: f64 = 0.01;

/// Sides of the polygon approximating a focus circle. A multiple of 4, so that vertices land
/// on the circle's extreme x and y.
pub const CIRCLE_NSIDES: usize = 20;

/// Hole removal normally converges after one extra union; this bounds pathological inputs.
const MAX_HOLE_PASSES: usize = 16;

#[must_use]
pub fn empty_shape() -> MultiPolygon<f64> {
    MultiPolygon::new(Vec::new())
}

/// A regular `CIRCLE_NSIDES`-gon inscribed in the circle of `radius` about `(x, y)`.
#[must_use]
pub fn circle(x: f64, y: f64, radius: f64) -> Polygon<f64> {
    #[allow(clippy::cast_precision_loss)]
    let step = 2.0 * PI / CIRCLE_NSIDES as f64;
    let ring: Vec<Coord<f64>> = (0..CIRCLE_NSIDES)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let angle = step * i as f64;
            Coord {
                x: x + radius * angle.cos(),
                y: y + radius * angle.sin(),
            }
        })
        .collect();
    Polygon::new(LineString::new(ring), Vec::new())
}

/// Unions two shapes, skipping the clipper when either side is empty.
#[must_use]
pub fn union(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if a.0.is_empty() {
        return b.clone();
    }
    if b.0.is_empty() {
        return a.clone();
    }
    a.union(b)
}

/// Unions a shape with itself one member at a time, merging members that overlap or nest.
#[must_use]
pub fn dissolve(shape: MultiPolygon<f64>) -> MultiPolygon<f64> {
    let mut members = shape.0.into_iter();
    let Some(first) = members.next() else {
        return empty_shape();
    };
    members.fold(MultiPolygon::new(vec![first]), |merged, member| {
        union(&merged, &MultiPolygon::new(vec![member]))
    })
}

/// Drops every interior ring, returning the filled shape and the rings removed.
#[must_use]
pub fn strip_holes(shape: MultiPolygon<f64>) -> (MultiPolygon<f64>, Vec<LineString<f64>>) {
    let mut holes = Vec::new();
    let filled = shape
        .0
        .into_iter()
        .map(|polygon| {
            let (exterior, interiors) = polygon.into_inner();
            holes.extend(interiors);
            Polygon::new(exterior, Vec::new())
        })
        .collect();
    (MultiPolygon::new(filled), holes)
}

/// Removes holes and re-unions until the shape has none left.
///
/// Removing a hole can leave a contour that sat inside it overlapping the filled area; the
/// self-union absorbs it, and is repeated in case that produces a new hole.
#[must_use]
pub fn fill_holes(mut shape: MultiPolygon<f64>) -> (MultiPolygon<f64>, Vec<LineString<f64>>) {
    let mut removed = Vec::new();
    for pass in 0..MAX_HOLE_PASSES {
        let (filled, holes) = strip_holes(shape);
        if holes.is_empty() {
            return (filled, removed);
        }
        trace!("hole pass {pass}: removed {} hole(s)", holes.len());
        removed.extend(holes);
        shape = dissolve(filled);
    }
    warn!("shape still had holes after {MAX_HOLE_PASSES} passes; dropping them");
    let (filled, holes) = strip_holes(shape);
    removed.extend(holes);
    (filled, removed)
}

/// Index of the contour covering `(x, y)`, boundary included.
#[must_use]
pub fn contour_containing(shape: &MultiPolygon<f64>, x: f64, y: f64) -> Option<usize> {
    let point = Point::new(x, y);
    shape.0.iter().position(|polygon| polygon.intersects(&point))
}

/// Whether a ring covers `(x, y)`, boundary included.
#[must_use]
pub fn ring_contains(ring: &LineString<f64>, x: f64, y: f64) -> bool {
    Polygon::new(ring.clone(), Vec::new()).intersects(&Point::new(x, y))
}

/// Finds the contour that is exactly the circle just added about `(x, y)`: the one with a
/// vertex within `tolerance` of each of the circle's four extreme points.
#[must_use]
pub fn find_circle_contour(shape: &MultiPolygon<f64>, x: f64, y: f64, radius: f64, tolerance: f64) -> Option<usize> {
    let extremes = [(x + radius, y), (x, y + radius), (x - radius, y), (x, y - radius)];
    let tolerance_sq = tolerance * tolerance;
    shape.0.iter().position(|polygon| {
        extremes.iter().all(|(ex, ey)| {
            polygon.exterior().coords().any(|c| {
                let dx = c.x - ex;
                let dy = c.y - ey;
                dx * dx + dy * dy <= tolerance_sq
            })
        })
    })
}

#[must_use]
pub fn area(shape: &MultiPolygon<f64>) -> f64 {
    shape.unsigned_area()
}

fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.lines().map(|line| line.dx().hypot(line.dy())).sum()
}

/// Total boundary length of every ring.
#[must_use]
pub fn perimeter(shape: &MultiPolygon<f64>) -> f64 {
    shape
        .0
        .iter()
        .map(|polygon| ring_length(polygon.exterior()) + polygon.interiors().iter().map(ring_length).sum::<f64>())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(polygon: Polygon<f64>) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon])
    }

    #[test]
    fn circle_has_cardinal_vertices() {
        let polygon = circle(1.0, 2.0, 3.0);
        // Closed ring: first vertex repeated at the end.
        assert_eq!(polygon.exterior().coords().count(), CIRCLE_NSIDES + 1);
        let shape = single(polygon);
        assert_eq!(find_circle_contour(&shape, 1.0, 2.0, 3.0, EPSILON), Some(0));
        assert_eq!(find_circle_contour(&shape, 1.5, 2.0, 3.0, EPSILON), None);
    }

    #[test]
    fn circle_area_close_to_pi_r_squared() {
        let shape = single(circle(0.0, 0.0, 1.0));
        // Regular 20-gon: (n/2) sin(2pi/n) r^2.
        let expected = 10.0 * (2.0 * PI / 20.0).sin();
        assert!((area(&shape) - expected).abs() < 1e-9);
        let expected_perimeter = 20.0 * 2.0 * (PI / 20.0).sin();
        assert!((perimeter(&shape) - expected_perimeter).abs() < 1e-9);
    }

    #[test]
    fn union_of_disjoint_circles_has_two_contours() {
        let a = single(circle(0.0, 0.0, 1.0));
        let b = single(circle(10.0, 0.0, 1.0));
        let merged = union(&a, &b);
        assert_eq!(merged.0.len(), 2);
        assert!(contour_containing(&merged, 10.0, 0.0).is_some());
        assert_eq!(contour_containing(&merged, 5.0, 0.0), None);
    }

    #[test]
    fn fill_holes_absorbs_ring_interior() {
        let outer = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            vec![LineString::from(vec![(2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0)])],
        );
        let island = Polygon::new(
            LineString::from(vec![(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0)]),
            Vec::new(),
        );
        let (filled, holes) = fill_holes(MultiPolygon::new(vec![outer, island]));
        assert_eq!(holes.len(), 1);
        assert_eq!(filled.0.len(), 1);
        assert!(filled.0.iter().all(|p| p.interiors().is_empty()));
        assert!((area(&filled) - 100.0).abs() < 1e-9);
        assert!(ring_contains(&holes[0], 5.0, 5.0));
    }
}
