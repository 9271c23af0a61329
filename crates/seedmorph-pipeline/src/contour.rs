//! Contour tracing: extract external boundaries from a binary mask.
//!
//! This module defines the [`ContourTracer`] trait for pluggable contour
//! tracing algorithms and the [`ContourTracerKind`] enum for selecting
//! which algorithm to use at runtime.
//!
//! Only external boundaries are returned; holes inside a grain and any
//! blobs nested inside those holes are ignored. Straight runs of the
//! boundary chain are compressed to their end points, so the vertex
//! count of a traced contour reflects how often the boundary turns.

use image::GrayImage;
use imageproc::contours::BorderType;

use crate::types::{Contour, Point};

/// Selects which contour tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`.
    #[default]
    BorderFollowing,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (non-zero pixels = foreground).
/// Output: the external boundary of every connected foreground region,
/// in mask pixel coordinates.
pub trait ContourTracer {
    /// Trace external contours in the given binary mask.
    fn trace(&self, mask: &GrayImage) -> Vec<Contour>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &GrayImage) -> Vec<Contour> {
        match *self {
            Self::BorderFollowing => trace_border_following(mask),
        }
    }
}

/// Suzuki-Abe border following, keeping outermost borders only.
///
/// The mask is padded with a one-pixel background frame first so that
/// regions touching the image edge still get a closed outer border.
fn trace_border_following(mask: &GrayImage) -> Vec<Contour> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }

    let padded = pad_with_background(mask);
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(&padded);

    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| !c.points.is_empty())
        .map(|c| {
            let chain: Vec<(i64, i64)> = c
                .points
                .iter()
                .map(|p| (i64::from(p.x) - 1, i64::from(p.y) - 1))
                .collect();
            let points = compress_chain(&chain)
                .into_iter()
                .map(|(x, y)| Point::new(to_f64(x), to_f64(y)))
                .collect();
            Contour::new(points)
        })
        .collect()
}

/// Copy `mask` into a canvas one pixel larger on every side.
fn pad_with_background(mask: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] != 0 {
            padded.put_pixel(x + 1, y + 1, image::Luma([255]));
        }
    }
    padded
}

/// Drop every chain point that continues the previous step's direction.
///
/// The chain is closed: the last point steps back to the first. What
/// remains are the corners where the boundary changes direction, which
/// describe the same polygon with fewer vertices.
#[must_use]
pub fn compress_chain(chain: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut chain = chain.to_vec();
    chain.dedup();
    while chain.len() > 1 && chain.first() == chain.last() {
        chain.pop();
    }

    let n = chain.len();
    if n < 3 {
        return chain;
    }

    let step = |from: (i64, i64), to: (i64, i64)| ((to.0 - from.0).signum(), (to.1 - from.1).signum());

    let compressed: Vec<(i64, i64)> = (0..n)
        .filter(|&i| {
            let prev = chain[(i + n - 1) % n];
            let here = chain[i];
            let next = chain[(i + 1) % n];
            step(prev, here) != step(here, next)
        })
        .map(|i| chain[i])
        .collect();

    // A degenerate chain with no corners still has to describe something.
    if compressed.is_empty() {
        chain[..1].to_vec()
    } else {
        compressed
    }
}

#[allow(clippy::cast_precision_loss)]
const fn to_f64(v: i64) -> f64 {
    v as f64
}
