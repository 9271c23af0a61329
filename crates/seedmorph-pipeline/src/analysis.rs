//! Per-image analysis: detections in, filtered feature rows out.
//!
//! For one image the detector is run once, every detection above the
//! confidence cutoff is traced and measured, and the resulting rows are
//! passed through the outlier filter. Nothing here is shared between
//! images; [`crate::batch`] stitches the per-image results together.

use crate::contour::{ContourTracer, ContourTracerKind};
use crate::decode::{decode_rgb, dimensions_of};
use crate::detector::Detector;
use crate::diagnostics::{Clock, ImageDiagnostics};
use crate::measure::measure_contour;
use crate::outlier::filter_outliers;
use crate::types::{AnalysisConfig, FeatureRow, InstanceMask, PipelineError};

/// The filtered rows of one image and how they were arrived at.
#[derive(Debug, Clone)]
pub struct ImageAnalysis {
    /// Image file name.
    pub source_image: String,
    /// Rows that survived outlier filtering, in detection order.
    pub rows: Vec<FeatureRow>,
    /// Counters and timing for this image.
    pub diagnostics: ImageDiagnostics,
}

/// Measure one detection.
///
/// Detections whose score is not a number in `[0, 1]` are discarded with
/// a warning. Detections scoring below `config.min_detection_score`
/// yield nothing.
/// Otherwise every external contour of the mask with at least
/// `config.min_contour_vertices` vertices becomes one row; all rows of
/// the same detection share `object_id`. Contours with degenerate
/// geometry are dropped with a warning.
///
/// Counters in `diagnostics` are updated; its identity fields are not.
pub fn extract_instance_features(
    source_image: &str,
    object_id: usize,
    instance: &InstanceMask,
    config: &AnalysisConfig,
    diagnostics: &mut ImageDiagnostics,
) -> Vec<FeatureRow> {
    if !(0.0..=1.0).contains(&instance.score) {
        diagnostics.invalid_score += 1;
        tracing::warn!(
            source_image,
            object_id,
            score = instance.score,
            "discarding detection with out-of-range score",
        );
        return Vec::new();
    }
    if instance.score < config.min_detection_score {
        diagnostics.below_score += 1;
        tracing::debug!(
            source_image,
            object_id,
            score = instance.score,
            "detection below score cutoff",
        );
        return Vec::new();
    }

    let contours = ContourTracerKind::default().trace(&instance.mask);
    diagnostics.contours_traced += contours.len();

    let dx = f64::from(instance.offset_x);
    let dy = f64::from(instance.offset_y);

    let mut rows = Vec::new();
    for contour in contours {
        if contour.len() < config.min_contour_vertices {
            diagnostics.contours_too_small += 1;
            tracing::debug!(
                source_image,
                object_id,
                vertices = contour.len(),
                "contour below vertex minimum",
            );
            continue;
        }

        let contour = contour.translated(dx, dy);
        match measure_contour(&contour, config.smoothing_tolerance) {
            Ok(shape) => rows.push(FeatureRow {
                source_image: source_image.to_string(),
                object_id,
                detection_score: instance.score,
                shape,
            }),
            Err(err) => {
                diagnostics.contours_degenerate += 1;
                tracing::warn!(source_image, object_id, %err, "skipping degenerate contour");
            }
        }
    }
    rows
}

/// Measure and filter the detections of one image.
///
/// `object_id` is the index of each detection in `detections`, counting
/// the ones skipped for a low score.
#[must_use]
pub fn analyze_detections(
    source_image: &str,
    detections: &[InstanceMask],
    config: &AnalysisConfig,
) -> ImageAnalysis {
    let mut diagnostics = ImageDiagnostics::new(source_image);
    diagnostics.detections = detections.len();

    let measured: Vec<FeatureRow> = detections
        .iter()
        .enumerate()
        .flat_map(|(object_id, instance)| {
            extract_instance_features(source_image, object_id, instance, config, &mut diagnostics)
        })
        .collect();
    diagnostics.rows_measured = measured.len();

    let outcome = filter_outliers(measured, &config.iqr_multipliers, config.iqr_policy);
    for rejection in &outcome.rejections {
        *diagnostics.rejections.entry(rejection.measurement).or_default() += rejection.count;
    }
    diagnostics.rows_kept = outcome.kept.len();

    if outcome.rejected() > 0 {
        tracing::debug!(
            source_image,
            rejected = outcome.rejected(),
            "rows rejected as outliers",
        );
    }

    ImageAnalysis {
        source_image: source_image.to_string(),
        rows: outcome.kept,
        diagnostics,
    }
}

/// Decode, detect, measure and filter one image.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] or [`PipelineError::ImageDecode`]
/// when the bytes are not a readable image, and
/// [`PipelineError::Detection`] when the detector fails on it.
pub fn analyze_image<D, C>(
    source_image: &str,
    bytes: &[u8],
    detector: &D,
    config: &AnalysisConfig,
    clock: &C,
) -> Result<ImageAnalysis, PipelineError>
where
    D: Detector + ?Sized,
    C: Clock,
{
    let start = clock.now();

    let image = decode_rgb(bytes)?;
    let detections = detector.detect(&image)?;

    let mut analysis = analyze_detections(source_image, &detections, config);
    analysis.diagnostics.dimensions = Some(dimensions_of(&image));
    analysis.diagnostics.duration = clock.elapsed(&start);
    Ok(analysis)
}
