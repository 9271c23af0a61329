//! Contour smoothing using the Ramer-Douglas-Peucker algorithm.
//!
//! A traced pixel boundary is a staircase. Its arc length overshoots the
//! length of the curve it samples by several percent, which drags the
//! circularity of a perfect disc down to about 0.89. Simplifying the ring
//! with a sub-pixel-to-pixel tolerance removes the stairs while keeping
//! every vertex on the traced boundary.

use crate::types::{Contour, Point};

/// Simplify a closed contour using the Ramer-Douglas-Peucker algorithm.
///
/// The ring is split at its first vertex and the vertex farthest from it;
/// both halves are simplified independently so the result stays closed.
/// Vertices within `tolerance` pixels of the chord between their kept
/// neighbors are removed. A tolerance of 0.0 preserves all points.
///
/// Contours with fewer than four vertices are returned unchanged.
#[must_use = "returns the smoothed contour"]
pub fn smooth_contour(contour: &Contour, tolerance: f64) -> Contour {
    let points = contour.points();
    let n = points.len();
    if n < 4 || tolerance <= 0.0 {
        return contour.clone();
    }

    let first = points[0];
    let far = (1..n)
        .max_by(|&a, &b| {
            first
                .distance_squared(points[a])
                .total_cmp(&first.distance_squared(points[b]))
        })
        .unwrap_or(n / 2);

    // Close the ring so the second half ends where the first begins.
    let mut ring = points.to_vec();
    ring.push(first);

    let mut kept = vec![false; ring.len()];
    kept[0] = true;
    kept[far] = true;

    rdp_recurse(&ring, 0, far, tolerance, &mut kept);
    rdp_recurse(&ring, far, n, tolerance, &mut kept);

    let simplified: Vec<Point> = points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    Contour::new(simplified)
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
