//! Analysis diagnostics: timing and counts for each image and the batch.
//!
//! Every call to [`analyze_image`](crate::analyze_image) collects
//! diagnostics alongside its rows. They answer "where did my grains go"
//! when a table comes out shorter than expected: skipped for a low
//! score, traced too small, degenerate, or rejected as an outlier.
//!
//! Time is read through the [`Clock`] trait so the pipeline stays free
//! of platform timers. The binary supplies a clock backed by
//! `std::time::Instant`; tests use [`NullClock`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Measurement};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic time for duration measurements.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Capture the current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances. Every duration it reports is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, (): &()) -> Duration {
        Duration::ZERO
    }
}

/// Counters collected while analysing one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDiagnostics {
    /// Image file name.
    pub source_image: String,
    /// Decoded image size, when the image came in as bytes.
    pub dimensions: Option<Dimensions>,
    /// Detections returned by the detector.
    pub detections: usize,
    /// Detections discarded for a score outside `[0, 1]` or not a number.
    pub invalid_score: usize,
    /// Detections skipped for scoring below the cutoff.
    pub below_score: usize,
    /// External contours traced across all kept detections.
    pub contours_traced: usize,
    /// Contours dropped for having too few vertices.
    pub contours_too_small: usize,
    /// Contours dropped for degenerate geometry.
    pub contours_degenerate: usize,
    /// Rows measured before outlier filtering.
    pub rows_measured: usize,
    /// Rows that survived outlier filtering.
    pub rows_kept: usize,
    /// Rows rejected by each measurement's IQR pass.
    pub rejections: BTreeMap<Measurement, usize>,
    /// Wall-clock duration of the whole image (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl ImageDiagnostics {
    /// Empty counters for the named image.
    #[must_use]
    pub fn new(source_image: &str) -> Self {
        Self {
            source_image: source_image.to_string(),
            ..Self::default()
        }
    }

    /// Rows rejected as outliers across all measurements.
    #[must_use]
    pub fn rows_rejected(&self) -> usize {
        self.rejections.values().sum()
    }
}

/// An image that could not be analysed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFailure {
    /// Image file name.
    pub source_image: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Diagnostics for a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Per-image diagnostics for every analysed image, in processing order.
    pub images: Vec<ImageDiagnostics>,
    /// Images that failed, in processing order.
    pub failures: Vec<ImageFailure>,
    /// Total wall-clock duration of the batch (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl BatchSummary {
    /// Number of images that were analysed successfully.
    #[must_use]
    pub const fn images_analysed(&self) -> usize {
        self.images.len()
    }

    /// Total rows written to the output table.
    #[must_use]
    pub fn rows_kept(&self) -> usize {
        self.images.iter().map(|d| d.rows_kept).sum()
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Analysis Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Images: {} analysed, {} failed",
            self.images.len(),
            self.failures.len(),
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<32} {:>10} {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
            "Image", "Duration", "Det", "LowSc", "Small", "Degen", "Meas", "Kept"
        ));
        lines.push("-".repeat(88));

        for d in &self.images {
            lines.push(format!(
                "{:<32} {:>8.3}ms {:>6} {:>6} {:>6} {:>6} {:>6} {:>6}",
                d.source_image,
                duration_ms(d.duration),
                d.detections,
                d.below_score,
                d.contours_too_small,
                d.contours_degenerate,
                d.rows_measured,
                d.rows_kept,
            ));
            if d.invalid_score > 0 {
                lines.push(format!("    invalid scores: {}", d.invalid_score));
            }
            if !d.rejections.is_empty() {
                lines.push(format!("    rejected: {}", format_rejections(&d.rejections)));
            }
        }

        if !self.failures.is_empty() {
            lines.push(String::new());
            lines.push("Failures:".to_string());
            for f in &self.failures {
                lines.push(format!("  {}: {}", f.source_image, f.reason));
            }
        }

        lines.push(String::new());
        lines.push(format!("Rows written: {}", self.rows_kept()));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// `area=2 circularity=1` style summary of per-measurement rejections.
fn format_rejections(rejections: &BTreeMap<Measurement, usize>) -> String {
    rejections
        .iter()
        .map(|(m, n)| format!("{m}={n}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> BatchSummary {
        let mut first = ImageDiagnostics::new("plate_01.png");
        first.detections = 12;
        first.below_score = 2;
        first.contours_traced = 10;
        first.rows_measured = 10;
        first.rows_kept = 8;
        first.rejections.insert(Measurement::Area, 1);
        first.rejections.insert(Measurement::Circularity, 1);
        first.duration = Duration::from_millis(250);

        let mut second = ImageDiagnostics::new("plate_02.png");
        second.detections = 4;
        second.invalid_score = 1;
        second.contours_traced = 3;
        second.rows_measured = 3;
        second.rows_kept = 3;

        BatchSummary {
            images: vec![first, second],
            failures: vec![ImageFailure {
                source_image: "broken.jpg".to_string(),
                reason: "failed to decode image".to_string(),
            }],
            total_duration: Duration::from_millis(500),
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn null_clock_reports_zero() {
        let clock = NullClock;
        let start = clock.now();
        assert_eq!(clock.elapsed(&start), Duration::ZERO);
    }

    #[test]
    fn totals_sum_over_images() {
        let summary = sample();
        assert_eq!(summary.images_analysed(), 2);
        assert_eq!(summary.rows_kept(), 11);
        assert_eq!(summary.images[0].rows_rejected(), 2);
    }

    #[test]
    fn report_lists_images_rejections_and_failures() {
        let report = sample().report();
        assert!(report.contains("Analysis Diagnostics Report"));
        assert!(report.contains("2 analysed, 1 failed"));
        assert!(report.contains("plate_01.png"));
        assert!(report.contains("area=1 circularity=1"));
        assert!(report.contains("invalid scores: 1"));
        assert!(report.contains("broken.jpg: failed to decode image"));
        assert!(report.contains("Rows written: 11"));
    }

    #[test]
    fn json_round_trip_keeps_durations_and_keys() {
        let summary = sample();
        let json = serde_json::to_value(&summary).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(json["images"][0]["rejections"]["circularity"], 1);

        let back: BatchSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = r#"{"images": [], "failures": [], "total_duration": -1.0}"#;
        assert!(serde_json::from_str::<BatchSummary>(json).is_err());
    }
}
