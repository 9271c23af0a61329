//! Shared types for the seedmorph grain measurement pipeline.

use serde::{Deserialize, Serialize};

use crate::detector::DetectorError;

/// Re-export `GrayImage` so downstream crates can build instance masks
/// without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so detector backends outside this crate can
/// accept decoded images without depending on `image` directly.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// A closed boundary: the last point connects back to the first.
///
/// The closing point is never stored twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a new contour from its boundary points in traversal order.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Iterate over the closed ring's edges, including the closing edge
    /// from the last vertex back to the first.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.0.len();
        (0..n).map(move |i| (self.0[i], self.0[(i + 1) % n]))
    }

    /// Signed enclosed area (shoelace formula).
    ///
    /// Positive for counter-clockwise rings in a y-up frame, which is
    /// clockwise on screen. Contours with fewer than three vertices
    /// enclose nothing.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        if self.0.len() < 3 {
            return 0.0;
        }
        // Shift to the first vertex to keep the cross products small.
        let origin = self.0[0];
        let twice: f64 = self
            .edges()
            .map(|(a, b)| {
                let (ax, ay) = (a.x - origin.x, a.y - origin.y);
                let (bx, by) = (b.x - origin.x, b.y - origin.y);
                ax.mul_add(by, -(bx * ay))
            })
            .sum();
        twice / 2.0
    }

    /// Unsigned enclosed area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Closed arc length: the sum of all edge lengths including the
    /// closing edge.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        if self.0.len() < 2 {
            return 0.0;
        }
        self.edges().map(|(a, b)| a.distance(b)).sum()
    }

    /// Return a copy of the contour shifted by `(dx, dy)`.
    #[must_use]
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self(
            self.0
                .iter()
                .map(|p| Point::new(p.x + dx, p.y + dy))
                .collect(),
        )
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// One detected object: a binary mask and the detector's confidence.
///
/// The mask is stored as a crop placed at `(offset_x, offset_y)` in the
/// source image. Any non-zero pixel belongs to the instance. A
/// full-extent mask is simply a crop at offset `(0, 0)`.
#[derive(Debug, Clone)]
pub struct InstanceMask {
    /// Horizontal position of the crop's left column in the source image.
    pub offset_x: u32,
    /// Vertical position of the crop's top row in the source image.
    pub offset_y: u32,
    /// Binary mask crop (non-zero = instance pixel).
    pub mask: GrayImage,
    /// Detector confidence in `[0, 1]`.
    pub score: f64,
}

impl InstanceMask {
    /// A mask covering the whole source image.
    #[must_use]
    pub const fn full(mask: GrayImage, score: f64) -> Self {
        Self {
            offset_x: 0,
            offset_y: 0,
            mask,
            score,
        }
    }

    /// A mask crop located at `(offset_x, offset_y)` in the source image.
    #[must_use]
    pub const fn cropped(mask: GrayImage, offset_x: u32, offset_y: u32, score: f64) -> Self {
        Self {
            offset_x,
            offset_y,
            mask,
            score,
        }
    }

    /// Number of instance pixels.
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        self.mask.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
    }
}

/// The eight filtered shape parameters, in filtering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    /// Enclosed contour area (px²).
    Area,
    /// Long side of the minimum-area bounding rectangle (px).
    Length,
    /// Short side of the minimum-area bounding rectangle (px).
    Width,
    /// `length / width`.
    LengthToWidthRatio,
    /// Eccentricity of the fitted ellipse.
    Eccentricity,
    /// `area / convex hull area`.
    Solidity,
    /// Closed arc length (px).
    Perimeter,
    /// `4π·area / perimeter²`.
    Circularity,
}

impl Measurement {
    /// All measurements in the order the outlier filter applies them.
    pub const ALL: [Self; 8] = [
        Self::Area,
        Self::Length,
        Self::Width,
        Self::LengthToWidthRatio,
        Self::Eccentricity,
        Self::Solidity,
        Self::Perimeter,
        Self::Circularity,
    ];

    /// Configuration key for this measurement.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Area => "area",
            Self::Length => "length",
            Self::Width => "width",
            Self::LengthToWidthRatio => "length_to_width_ratio",
            Self::Eccentricity => "eccentricity",
            Self::Solidity => "solidity",
            Self::Perimeter => "perimeter",
            Self::Circularity => "circularity",
        }
    }

    /// Read this measurement from a set of shape measurements.
    #[must_use]
    pub const fn value(self, shape: &ShapeMeasurements) -> f64 {
        match self {
            Self::Area => shape.area,
            Self::Length => shape.length,
            Self::Width => shape.width,
            Self::LengthToWidthRatio => shape.length_to_width_ratio,
            Self::Eccentricity => shape.eccentricity,
            Self::Solidity => shape.solidity,
            Self::Perimeter => shape.perimeter,
            Self::Circularity => shape.circularity,
        }
    }
}

impl std::fmt::Display for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Morphological measurements of one contour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeMeasurements {
    /// Enclosed area (px²).
    pub area: f64,
    /// Long side of the minimum-area bounding rectangle (px).
    pub length: f64,
    /// Short side of the minimum-area bounding rectangle (px).
    pub width: f64,
    /// `length / width`, always `>= 1`.
    pub length_to_width_ratio: f64,
    /// Eccentricity of the fitted ellipse, in `[0, 1)`.
    pub eccentricity: f64,
    /// `area / convex hull area`, in `(0, 1]`.
    pub solidity: f64,
    /// Closed arc length (px).
    pub perimeter: f64,
    /// `4π·area / perimeter²`; 1.0 for a perfect circle.
    pub circularity: f64,
}

/// One measured grain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// File name of the image the grain was found in.
    pub source_image: String,
    /// Index of the detection within the image's detection set.
    pub object_id: usize,
    /// The detector's confidence, copied verbatim.
    pub detection_score: f64,
    /// Shape measurements of the grain's contour.
    #[serde(flatten)]
    pub shape: ShapeMeasurements,
}

/// IQR multiplier `k` per measurement: rows outside
/// `[Q1 - k·IQR, Q3 + k·IQR]` are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IqrMultipliers {
    /// Multiplier for [`Measurement::Area`].
    pub area: f64,
    /// Multiplier for [`Measurement::Length`].
    pub length: f64,
    /// Multiplier for [`Measurement::Width`].
    pub width: f64,
    /// Multiplier for [`Measurement::LengthToWidthRatio`].
    pub length_to_width_ratio: f64,
    /// Multiplier for [`Measurement::Eccentricity`].
    pub eccentricity: f64,
    /// Multiplier for [`Measurement::Solidity`].
    pub solidity: f64,
    /// Multiplier for [`Measurement::Perimeter`].
    pub perimeter: f64,
    /// Multiplier for [`Measurement::Circularity`].
    pub circularity: f64,
}

impl IqrMultipliers {
    /// Multiplier for the given measurement.
    #[must_use]
    pub const fn get(&self, measurement: Measurement) -> f64 {
        match measurement {
            Measurement::Area => self.area,
            Measurement::Length => self.length,
            Measurement::Width => self.width,
            Measurement::LengthToWidthRatio => self.length_to_width_ratio,
            Measurement::Eccentricity => self.eccentricity,
            Measurement::Solidity => self.solidity,
            Measurement::Perimeter => self.perimeter,
            Measurement::Circularity => self.circularity,
        }
    }
}

impl Default for IqrMultipliers {
    fn default() -> Self {
        Self {
            area: 1.0,
            length: 1.0,
            width: 1.0,
            length_to_width_ratio: 1.2,
            eccentricity: 1.2,
            solidity: 1.2,
            perimeter: 1.0,
            circularity: 1.5,
        }
    }
}

/// How quartiles are computed across the eight filter passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IqrPolicy {
    /// Each pass recomputes quartiles on the rows that survived the
    /// previous pass. Stricter on tails; matches historical output.
    Sequential,
    /// Quartiles for every measurement are computed once from the full
    /// per-image row set; a row survives if it is inside all eight bands.
    #[default]
    FixedBounds,
}

/// Configuration for grain analysis.
///
/// One instance is built up front and passed by reference to every
/// pipeline component; nothing reads process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Detections scoring below this are skipped before tracing.
    pub min_detection_score: f64,

    /// Traced contours with fewer vertices than this are noise.
    ///
    /// Counted after straight runs of the boundary chain are compressed
    /// to their end points.
    pub min_contour_vertices: usize,

    /// Ramer-Douglas-Peucker tolerance (px) applied to each traced
    /// contour before area, perimeter, hull and rectangle are measured.
    /// `0.0` measures the raw pixel chain.
    pub smoothing_tolerance: f64,

    /// Per-measurement IQR multipliers for the outlier filter.
    pub iqr_multipliers: IqrMultipliers,

    /// Quartile policy for the outlier filter.
    pub iqr_policy: IqrPolicy,

    /// File extensions (without the dot, case-insensitive) treated as
    /// images when scanning an input directory.
    pub image_extensions: Vec<String>,
}

impl AnalysisConfig {
    /// Default confidence cutoff.
    pub const DEFAULT_MIN_DETECTION_SCORE: f64 = 0.95;

    /// Default minimum contour vertex count.
    pub const DEFAULT_MIN_CONTOUR_VERTICES: usize = 100;

    /// Default contour smoothing tolerance in pixels.
    pub const DEFAULT_SMOOTHING_TOLERANCE: f64 = 1.0;

    /// Check every field for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(&self.min_detection_score) {
            return Err(PipelineError::InvalidConfig(format!(
                "min_detection_score must be within [0, 1], got {}",
                self.min_detection_score
            )));
        }
        if !self.smoothing_tolerance.is_finite() || self.smoothing_tolerance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "smoothing_tolerance must be finite and non-negative, got {}",
                self.smoothing_tolerance
            )));
        }
        for measurement in Measurement::ALL {
            let k = self.iqr_multipliers.get(measurement);
            if !k.is_finite() || k < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "iqr_multipliers.{measurement} must be finite and non-negative, got {k}"
                )));
            }
        }
        if self.image_extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(PipelineError::InvalidConfig(
                "image_extensions must name at least one extension".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a file name carries one of the configured image extensions.
    #[must_use]
    pub fn accepts_file_name(&self, file_name: &str) -> bool {
        let Some((stem, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        !stem.is_empty()
            && self
                .image_extensions
                .iter()
                .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_detection_score: Self::DEFAULT_MIN_DETECTION_SCORE,
            min_contour_vertices: Self::DEFAULT_MIN_CONTOUR_VERTICES,
            smoothing_tolerance: Self::DEFAULT_SMOOTHING_TOLERANCE,
            iqr_multipliers: IqrMultipliers::default(),
            iqr_policy: IqrPolicy::default(),
            image_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Analysis configuration is invalid.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    /// The detector backend failed on an image.
    #[error("detection failed: {0}")]
    Detection(#[from] DetectorError),

    /// A batch finished without a single image being submitted.
    #[error("no images to analyse")]
    NoImages,
}
