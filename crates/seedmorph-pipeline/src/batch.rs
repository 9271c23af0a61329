//! Batch aggregation: many images in, one ordered result table out.
//!
//! [`BatchAnalyzer`] is fed images one at a time in processing order.
//! Each image is analysed to completion before the next is accepted and
//! its surviving rows are appended to the table. A failing image is
//! recorded and skipped; it never aborts the batch.

use crate::analysis::analyze_image;
use crate::detector::Detector;
use crate::diagnostics::{BatchSummary, Clock, ImageFailure};
use crate::types::{AnalysisConfig, FeatureRow, PipelineError};

/// The finished result table and the diagnostics that go with it.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Surviving rows in image order, then detection order.
    pub rows: Vec<FeatureRow>,
    /// Per-image counters and failures.
    pub summary: BatchSummary,
}

/// Incremental batch analysis over a fixed detector and configuration.
pub struct BatchAnalyzer<'a, D: Detector + ?Sized, C: Clock> {
    detector: &'a D,
    config: &'a AnalysisConfig,
    clock: &'a C,
    start: C::Instant,
    rows: Vec<FeatureRow>,
    summary: BatchSummary,
}

impl<'a, D: Detector + ?Sized, C: Clock> BatchAnalyzer<'a, D, C> {
    /// Start a batch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// validation; nothing is analysed with a bad configuration.
    pub fn new(
        detector: &'a D,
        config: &'a AnalysisConfig,
        clock: &'a C,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            detector,
            config,
            clock,
            start: clock.now(),
            rows: Vec::new(),
            summary: BatchSummary::default(),
        })
    }

    /// Analyse one image and append its surviving rows.
    ///
    /// Returns the number of rows appended, or `None` if the image failed.
    /// Failures are logged and kept in the summary.
    pub fn push_image(&mut self, source_image: &str, bytes: &[u8]) -> Option<usize> {
        match analyze_image(source_image, bytes, self.detector, self.config, self.clock) {
            Ok(analysis) => {
                let kept = analysis.rows.len();
                let d = &analysis.diagnostics;
                tracing::info!(
                    source_image,
                    detections = d.detections,
                    measured = d.rows_measured,
                    kept,
                    "analysed image",
                );
                self.rows.extend(analysis.rows);
                self.summary.images.push(analysis.diagnostics);
                Some(kept)
            }
            Err(err) => {
                self.record_failure(source_image, &err.to_string());
                None
            }
        }
    }

    /// Record an image that could not even be handed to the analyzer,
    /// e.g. because it could not be read.
    pub fn record_failure(&mut self, source_image: &str, reason: &str) {
        tracing::warn!(source_image, reason, "skipping image");
        self.summary.failures.push(ImageFailure {
            source_image: source_image.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Close the batch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoImages`] if no image was submitted at all.
    /// A batch whose images all failed is still returned; the caller
    /// decides how to report it from [`BatchSummary::images_analysed`].
    pub fn finish(mut self) -> Result<BatchResult, PipelineError> {
        if self.summary.images.is_empty() && self.summary.failures.is_empty() {
            return Err(PipelineError::NoImages);
        }
        self.summary.total_duration = self.clock.elapsed(&self.start);
        if self.rows.is_empty() && !self.summary.images.is_empty() {
            tracing::warn!(
                images = self.summary.images.len(),
                "no grains survived; the result table will contain only its header",
            );
        }
        Ok(BatchResult {
            rows: self.rows,
            summary: self.summary,
        })
    }
}

/// Analyse `(file name, bytes)` pairs in the order given.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for a bad configuration and
/// [`PipelineError::NoImages`] when `images` is empty.
pub fn analyze_batch<'i, D, C, I>(
    images: I,
    detector: &D,
    config: &AnalysisConfig,
    clock: &C,
) -> Result<BatchResult, PipelineError>
where
    D: Detector + ?Sized,
    C: Clock,
    I: IntoIterator<Item = (&'i str, &'i [u8])>,
{
    let mut batch = BatchAnalyzer::new(detector, config, clock)?;
    for (name, bytes) in images {
        batch.push_image(name, bytes);
    }
    batch.finish()
}
