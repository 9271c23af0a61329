//! Shape measurement: turn one traced contour into morphological traits.
//!
//! Area, perimeter, convex hull and minimum-area rectangle are measured on
//! the smoothed contour (see [`crate::simplify`]). The ellipse is fitted
//! to the raw traced contour from its second-order region moments, which
//! keeps symmetric shapes exactly isotropic regardless of where the
//! smoothing pass happened to keep vertices.

use geo::{Area, ConvexHull, MinimumRotatedRect};

use crate::simplify::smooth_contour;
use crate::types::{Contour, Measurement, Point, ShapeMeasurements};

/// Lengths and areas at or below this are treated as zero.
const DEGENERATE_EPSILON: f64 = 1e-9;

/// Why a contour could not be measured.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum DegenerateGeometry {
    /// Fewer than three vertices survive smoothing.
    #[error("contour has only {0} vertices")]
    TooFewVertices(usize),

    /// The contour or its convex hull encloses no area.
    #[error("contour encloses zero area")]
    ZeroArea,

    /// The contour has zero arc length.
    #[error("contour has zero perimeter")]
    ZeroPerimeter,

    /// The minimum-area rectangle has a zero-length side.
    #[error("minimum-area rectangle has zero width")]
    ZeroWidth,

    /// The moment ellipse has a zero-length axis.
    #[error("fitted ellipse has a zero-length axis")]
    DegenerateEllipse,

    /// A derived value came out NaN or infinite.
    #[error("{0} is not finite")]
    NonFinite(Measurement),
}

/// An ellipse with the same second-order moments as a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    /// Region centroid.
    pub center: Point,
    /// Full length of the major axis.
    pub major_axis: f64,
    /// Full length of the minor axis.
    pub minor_axis: f64,
    /// Orientation of the major axis in radians, measured from +x.
    pub angle: f64,
}

impl Ellipse {
    /// `sqrt(1 - (minor / major)²)`, in `[0, 1)`.
    #[must_use]
    pub fn eccentricity(&self) -> f64 {
        let ratio = self.minor_axis / self.major_axis;
        ratio.mul_add(-ratio, 1.0).max(0.0).sqrt()
    }
}

/// Fit an ellipse to the region enclosed by `contour` via Green's theorem.
///
/// For a filled ellipse with semi-axes `a >= b` the normalized central
/// moments have eigenvalues `a²/4` and `b²/4`, so the fit is exact for
/// elliptical regions.
///
/// Returns `None` when the region has no area or a zero-length axis.
#[must_use]
pub fn fit_ellipse(contour: &Contour) -> Option<Ellipse> {
    let pts = contour.points();
    if pts.len() < 3 {
        return None;
    }

    // Work relative to the first vertex for numerical stability.
    let origin = pts[0];
    let mut a2 = 0.0; // 2 * signed area
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;

    for (p, q) in contour.edges() {
        let (x0, y0) = (p.x - origin.x, p.y - origin.y);
        let (x1, y1) = (q.x - origin.x, q.y - origin.y);
        let cross = x0.mul_add(y1, -(x1 * y0));
        a2 += cross;
        sx += (x0 + x1) * cross;
        sy += (y0 + y1) * cross;
        sxx += x1.mul_add(x1, x0.mul_add(x0, x0 * x1)) * cross;
        syy += y1.mul_add(y1, y0.mul_add(y0, y0 * y1)) * cross;
        sxy += (x0 * y1 + 2.0 * x0 * y0 + 2.0 * x1 * y1 + x1 * y0) * cross;
    }

    let area = a2 / 2.0;
    if area.abs() <= DEGENERATE_EPSILON {
        return None;
    }

    let cx = sx / (6.0 * area);
    let cy = sy / (6.0 * area);
    let mu20 = cx.mul_add(-cx, sxx / (12.0 * area));
    let mu02 = cy.mul_add(-cy, syy / (12.0 * area));
    let mu11 = cx.mul_add(-cy, sxy / (24.0 * area));

    let mean = (mu20 + mu02) / 2.0;
    let half_diff = (mu20 - mu02) / 2.0;
    let spread = half_diff.hypot(mu11);
    let lambda_major = mean + spread;
    let lambda_minor = mean - spread;

    if !(lambda_minor > DEGENERATE_EPSILON && lambda_major.is_finite()) {
        return None;
    }

    Some(Ellipse {
        center: Point::new(cx + origin.x, cy + origin.y),
        major_axis: 4.0 * lambda_major.sqrt(),
        minor_axis: 4.0 * lambda_minor.sqrt(),
        angle: 0.5 * (2.0 * mu11).atan2(mu20 - mu02),
    })
}

/// Side lengths `(long, short)` of the minimum-area rectangle enclosing
/// a contour.
///
/// Returns `None` when no rectangle can be fitted (fewer than two
/// distinct points).
#[must_use]
pub fn min_area_rect(contour: &Contour) -> Option<(f64, f64)> {
    let rect = to_geo_polygon(contour).minimum_rotated_rect()?;
    let corners: Vec<Point> = rect
        .exterior()
        .coords()
        .map(|c| Point::new(c.x, c.y))
        .collect();
    if corners.len() < 3 {
        return None;
    }
    let a = corners[0].distance(corners[1]);
    let b = corners[1].distance(corners[2]);
    Some((a.max(b), a.min(b)))
}

/// Area of the convex hull of a contour.
#[must_use]
pub fn convex_hull_area(contour: &Contour) -> f64 {
    to_geo_polygon(contour).convex_hull().unsigned_area()
}

/// Measure one traced contour.
///
/// # Errors
///
/// Returns a [`DegenerateGeometry`] describing the first zero-sized
/// dimension encountered. No NaN or infinite value is ever returned in
/// a successful measurement.
pub fn measure_contour(
    traced: &Contour,
    smoothing_tolerance: f64,
) -> Result<ShapeMeasurements, DegenerateGeometry> {
    let smoothed = smooth_contour(traced, smoothing_tolerance);
    if smoothed.len() < 3 {
        return Err(DegenerateGeometry::TooFewVertices(smoothed.len()));
    }

    let area = smoothed.area();
    if area <= DEGENERATE_EPSILON {
        return Err(DegenerateGeometry::ZeroArea);
    }

    let perimeter = smoothed.perimeter();
    if perimeter <= DEGENERATE_EPSILON {
        return Err(DegenerateGeometry::ZeroPerimeter);
    }

    let (length, width) = min_area_rect(&smoothed).ok_or(DegenerateGeometry::ZeroWidth)?;
    if width <= DEGENERATE_EPSILON {
        return Err(DegenerateGeometry::ZeroWidth);
    }

    let ellipse = fit_ellipse(traced).ok_or(DegenerateGeometry::DegenerateEllipse)?;

    let hull_area = convex_hull_area(&smoothed);
    if hull_area <= DEGENERATE_EPSILON {
        return Err(DegenerateGeometry::ZeroArea);
    }

    let shape = ShapeMeasurements {
        area,
        length,
        width,
        length_to_width_ratio: length / width,
        eccentricity: ellipse.eccentricity(),
        // Float noise can push a convex contour a hair over its own hull.
        solidity: (area / hull_area).min(1.0),
        perimeter,
        circularity: 4.0 * std::f64::consts::PI * area / (perimeter * perimeter),
    };

    if let Some(bad) = Measurement::ALL
        .into_iter()
        .find(|m| !m.value(&shape).is_finite())
    {
        return Err(DegenerateGeometry::NonFinite(bad));
    }

    Ok(shape)
}

fn to_geo_polygon(contour: &Contour) -> geo::Polygon<f64> {
    let coords: Vec<(f64, f64)> = contour.points().iter().map(|p| (p.x, p.y)).collect();
    geo::Polygon::new(geo::LineString::from(coords), vec![])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    /// A regular polygon approximating a circle or an axis-aligned ellipse.
    fn sampled_ellipse(a: f64, b: f64, n: usize) -> Contour {
        #[allow(clippy::cast_precision_loss)]
        let pts = (0..n)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / n as f64;
                Point::new(100.0 + a * t.cos(), 100.0 + b * t.sin())
            })
            .collect();
        Contour::new(pts)
    }

    fn rect(w: f64, h: f64) -> Contour {
        Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ])
    }

    #[test]
    fn ellipse_fit_recovers_axes() {
        let c = sampled_ellipse(40.0, 20.0, 720);
        let e = fit_ellipse(&c).unwrap();
        assert!((e.major_axis - 80.0).abs() < 0.1, "major={}", e.major_axis);
        assert!((e.minor_axis - 40.0).abs() < 0.1, "minor={}", e.minor_axis);
        assert!((e.center.x - 100.0).abs() < 1e-6);
        assert!((e.center.y - 100.0).abs() < 1e-6);
        assert!(e.angle.abs() < 1e-6);
        let expected = (1.0_f64 - 0.25).sqrt();
        assert!((e.eccentricity() - expected).abs() < 1e-3);
    }

    #[test]
    fn ellipse_fit_is_orientation_independent() {
        let c = sampled_ellipse(40.0, 20.0, 360);
        let reversed = Contour::new(c.points().iter().rev().copied().collect());
        let a = fit_ellipse(&c).unwrap();
        let b = fit_ellipse(&reversed).unwrap();
        assert!((a.major_axis - b.major_axis).abs() < 1e-9);
        assert!((a.minor_axis - b.minor_axis).abs() < 1e-9);
    }

    #[test]
    fn ellipse_fit_of_circle_has_zero_eccentricity() {
        let c = sampled_ellipse(30.0, 30.0, 360);
        let e = fit_ellipse(&c).unwrap();
        assert!(e.eccentricity() < 1e-3, "ecc={}", e.eccentricity());
    }

    #[test]
    fn ellipse_fit_rejects_collinear_points() {
        let c = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 10.0),
        ]);
        assert!(fit_ellipse(&c).is_none());
    }

    #[test]
    fn min_area_rect_of_axis_aligned_rectangle() {
        let (length, width) = min_area_rect(&rect(30.0, 10.0)).unwrap();
        assert!((length - 30.0).abs() < 1e-6);
        assert!((width - 10.0).abs() < 1e-6);
    }

    #[test]
    fn min_area_rect_of_rotated_rectangle() {
        // 20 x 5 rectangle rotated by 30 degrees.
        let (s, c) = (PI / 6.0).sin_cos();
        let corners = [(0.0, 0.0), (20.0, 0.0), (20.0, 5.0), (0.0, 5.0)];
        let pts = corners
            .iter()
            .map(|&(x, y)| Point::new(x * c - y * s, x * s + y * c))
            .collect();
        let (length, width) = min_area_rect(&Contour::new(pts)).unwrap();
        assert!((length - 20.0).abs() < 1e-6, "length={length}");
        assert!((width - 5.0).abs() < 1e-6, "width={width}");
    }

    #[test]
    fn convex_hull_area_of_concave_shape() {
        // An L shape: 10x10 square minus a 5x5 corner.
        let l = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 5.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        assert!((l.area() - 75.0).abs() < 1e-9);
        assert!((convex_hull_area(&l) - 87.5).abs() < 1e-9);
    }

    #[test]
    fn measure_rectangle() {
        let m = measure_contour(&rect(40.0, 10.0), 0.0).unwrap();
        assert!((m.area - 400.0).abs() < 1e-9);
        assert!((m.length - 40.0).abs() < 1e-6);
        assert!((m.width - 10.0).abs() < 1e-6);
        assert!((m.length_to_width_ratio - 4.0).abs() < 1e-6);
        assert!((m.solidity - 1.0).abs() < 1e-9);
        assert!((m.perimeter - 100.0).abs() < 1e-9);
        assert!((m.circularity - 4.0 * PI * 400.0 / 10_000.0).abs() < 1e-9);
        assert!(m.eccentricity > 0.9 && m.eccentricity < 1.0);
    }

    #[test]
    fn measure_sampled_circle() {
        let m = measure_contour(&sampled_ellipse(50.0, 50.0, 400), 0.5).unwrap();
        assert!(m.circularity > 0.99 && m.circularity <= 1.0, "{m:?}");
        assert!(m.eccentricity < 0.01, "{m:?}");
        assert!((m.length_to_width_ratio - 1.0).abs() < 0.02, "{m:?}");
        assert!(m.solidity > 0.99 && m.solidity <= 1.0, "{m:?}");
    }

    #[test]
    fn measure_is_pure() {
        let c = sampled_ellipse(35.0, 12.0, 200);
        assert_eq!(measure_contour(&c, 1.0), measure_contour(&c, 1.0));
    }

    #[test]
    fn measure_concave_shape_has_solidity_below_one() {
        let l = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 5.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        let m = measure_contour(&l, 0.0).unwrap();
        assert!((m.solidity - 75.0 / 87.5).abs() < 1e-9);
    }

    #[test]
    fn measure_collinear_contour_is_degenerate() {
        let c = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.0),
        ]);
        assert_eq!(measure_contour(&c, 0.0), Err(DegenerateGeometry::ZeroArea));
    }

    #[test]
    fn measure_two_point_contour_is_degenerate() {
        let c = Contour::new(vec![Point::new(0.0, 0.0), Point::new(4.0, 4.0)]);
        assert_eq!(
            measure_contour(&c, 0.0),
            Err(DegenerateGeometry::TooFewVertices(2))
        );
    }

    #[test]
    fn degenerate_geometry_display() {
        assert_eq!(
            DegenerateGeometry::NonFinite(Measurement::Circularity).to_string(),
            "circularity is not finite",
        );
        assert_eq!(
            DegenerateGeometry::ZeroWidth.to_string(),
            "minimum-area rectangle has zero width",
        );
    }
}
