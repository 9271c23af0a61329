//! seedmorph-pipeline: Pure grain measurement pipeline (sans-IO).
//!
//! Turns grain images into per-grain morphological traits through:
//! decode -> detect -> trace contours -> smooth -> measure ->
//! per-image outlier filter -> batch aggregation.
//!
//! Detection is pluggable through the [`Detector`] trait; the built-in
//! [`ThresholdDetector`] handles evenly lit grains on a plain background.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. All filesystem and terminal
//! interaction lives in the `seedmorph` binary.

pub mod analysis;
pub mod batch;
pub mod contour;
pub mod decode;
pub mod detector;
pub mod diagnostics;
pub mod measure;
pub mod outlier;
pub mod simplify;
pub mod types;

pub use analysis::{ImageAnalysis, analyze_detections, analyze_image, extract_instance_features};
pub use batch::{BatchAnalyzer, BatchResult, analyze_batch};
pub use contour::{ContourTracer, ContourTracerKind};
pub use detector::{
    Detector, DetectorError, DetectorModel, Foreground, ThresholdDetector, ThresholdLevel,
};
pub use diagnostics::{BatchSummary, Clock, ImageDiagnostics, ImageFailure, NullClock};
pub use measure::{DegenerateGeometry, measure_contour};
pub use outlier::{FilterOutcome, filter_outliers};
pub use types::{
    AnalysisConfig, Contour, Dimensions, FeatureRow, GrayImage, InstanceMask, IqrMultipliers,
    IqrPolicy, Measurement, PipelineError, Point, RgbImage, ShapeMeasurements,
};
