//! Instance detection: find grains in an image and return one mask each.
//!
//! The [`Detector`] trait is the seam between the measurement pipeline
//! and whatever produces instance masks. A pretrained segmentation
//! network, a stub returning synthetic masks in tests, and the built-in
//! [`ThresholdDetector`] all plug in the same way.
//!
//! [`DetectorModel`] is the serializable selection of a built-in
//! backend, loaded from a detector model file.

use std::collections::BTreeMap;

use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{Connectivity, connected_components};
use serde::{Deserialize, Serialize};

use crate::types::InstanceMask;

/// Errors reported by a detector backend.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// The image has zero width or height.
    #[error("image has no pixels")]
    EmptyImage,

    /// The backend failed for a reason of its own.
    #[error("{0}")]
    Backend(String),
}

/// Trait for instance detection backends.
///
/// Input: one decoded RGB image.
/// Output: one [`InstanceMask`] per detected object, in detection order.
/// Scores must lie in `[0, 1]`; analysis discards detections whose score
/// does not.
pub trait Detector {
    /// Detect object instances in an image.
    ///
    /// # Errors
    ///
    /// Returns a [`DetectorError`] when the backend cannot process the
    /// image. The caller treats this as a failure of that image only.
    fn detect(&self, image: &RgbImage) -> Result<Vec<InstanceMask>, DetectorError>;
}

/// A built-in detector backend and its parameters.
///
/// Serialized with a `kind` tag, e.g.
/// `{"kind": "threshold", "threshold": "otsu", "foreground": "bright"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorModel {
    /// Global threshold plus connected-component labelling.
    Threshold(ThresholdDetector),
}

impl Default for DetectorModel {
    fn default() -> Self {
        Self::Threshold(ThresholdDetector::default())
    }
}

impl Detector for DetectorModel {
    fn detect(&self, image: &RgbImage) -> Result<Vec<InstanceMask>, DetectorError> {
        match self {
            Self::Threshold(detector) => detector.detect(image),
        }
    }
}

/// How the foreground/background threshold is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdLevel {
    /// Otsu's method on the blurred grayscale image.
    #[default]
    Otsu,
    /// A fixed gray level.
    Fixed(u8),
}

/// Which side of the threshold the grains are on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Foreground {
    /// Grains are brighter than the background (`level < value`).
    #[default]
    Bright,
    /// Grains are darker than the background (`value <= level`).
    Dark,
}

/// Classical grain detector for evenly lit images on a plain background.
///
/// Steps: grayscale, Gaussian blur, global threshold, 8-connected
/// component labelling, removal of regions smaller than
/// `min_region_pixels`. Each remaining region becomes one instance in
/// raster order of its first pixel.
///
/// The score of a region compares its core contrast with the contrast of
/// the foreground class as a whole. The core is the gray level 90% of
/// the way through the region's pixels toward the foreground side, so
/// blurred rims do not drag it down. A region whose core clears the
/// threshold at least as far as the mean foreground pixel scores 1.0;
/// a faint region that barely clears the threshold approaches 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdDetector {
    /// Gaussian blur sigma applied before thresholding. `0.0` disables it.
    pub blur_sigma: f32,
    /// Threshold selection.
    pub threshold: ThresholdLevel,
    /// Which side of the threshold is foreground.
    pub foreground: Foreground,
    /// Regions with fewer pixels than this are discarded.
    pub min_region_pixels: u32,
}

impl Default for ThresholdDetector {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            threshold: ThresholdLevel::Otsu,
            foreground: Foreground::Bright,
            min_region_pixels: 64,
        }
    }
}

/// Per-region accumulator while scanning the label image.
struct Region {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    values: Vec<u8>,
}

/// Fraction of the way through a region's sorted pixels, toward the
/// foreground side, at which its core level is read.
const CORE_QUANTILE_NUM: usize = 9;
const CORE_QUANTILE_DEN: usize = 10;

impl ThresholdDetector {
    fn is_foreground(&self, value: u8, level: u8) -> bool {
        match self.foreground {
            Foreground::Bright => value > level,
            Foreground::Dark => value <= level,
        }
    }

    /// Signed distance of `value` from `level` toward the foreground.
    fn contrast(&self, value: f64, level: u8) -> f64 {
        match self.foreground {
            Foreground::Bright => value - f64::from(level),
            Foreground::Dark => f64::from(level) - value,
        }
    }

    /// Gray level of the region's core: the pixel 90% of the way from
    /// its background-side extreme to its foreground-side extreme.
    fn core_level(&self, values: &mut [u8]) -> u8 {
        if values.is_empty() {
            return 0;
        }
        let last = values.len() - 1;
        let index = match self.foreground {
            Foreground::Bright => last * CORE_QUANTILE_NUM / CORE_QUANTILE_DEN,
            Foreground::Dark => last * (CORE_QUANTILE_DEN - CORE_QUANTILE_NUM) / CORE_QUANTILE_DEN,
        };
        *values.select_nth_unstable(index).1
    }

    /// Confidence of one region given the mean gray level of all
    /// foreground pixels in the image.
    fn score(&self, values: &mut [u8], level: u8, foreground_mean: f64) -> f64 {
        let reference = self.contrast(foreground_mean, level);
        if reference <= 0.0 {
            return 1.0;
        }
        let core = self.contrast(f64::from(self.core_level(values)), level);
        (core / reference).clamp(0.0, 1.0)
    }
}

impl Detector for ThresholdDetector {
    fn detect(&self, image: &RgbImage) -> Result<Vec<InstanceMask>, DetectorError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectorError::EmptyImage);
        }

        let gray = image::imageops::grayscale(image);
        let blurred = if self.blur_sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(&gray, self.blur_sigma)
        } else {
            gray
        };

        let level = match self.threshold {
            ThresholdLevel::Otsu => imageproc::contrast::otsu_level(&blurred),
            ThresholdLevel::Fixed(level) => level,
        };

        let binary = GrayImage::from_fn(blurred.width(), blurred.height(), |x, y| {
            let v = blurred.get_pixel(x, y).0[0];
            Luma([if self.is_foreground(v, level) { 255 } else { 0 }])
        });

        let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

        // Labels are assigned in raster order, so a BTreeMap keeps
        // detection order deterministic.
        let mut regions: BTreeMap<u32, Region> = BTreeMap::new();
        let mut foreground_sum = 0_u64;
        let mut foreground_pixels = 0_u64;
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0];
            if label == 0 {
                continue;
            }
            let value = blurred.get_pixel(x, y).0[0];
            foreground_sum += u64::from(value);
            foreground_pixels += 1;
            regions
                .entry(label)
                .and_modify(|r| {
                    r.min_x = r.min_x.min(x);
                    r.min_y = r.min_y.min(y);
                    r.max_x = r.max_x.max(x);
                    r.max_y = r.max_y.max(y);
                    r.values.push(value);
                })
                .or_insert(Region {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                    values: vec![value],
                });
        }

        #[allow(clippy::cast_precision_loss)]
        let foreground_mean = if foreground_pixels == 0 {
            0.0
        } else {
            foreground_sum as f64 / foreground_pixels as f64
        };

        let instances = regions
            .into_iter()
            .filter(|(_, r)| {
                usize::try_from(self.min_region_pixels).is_ok_and(|min| r.values.len() >= min)
            })
            .map(|(label, mut r)| {
                let mask = GrayImage::from_fn(r.max_x - r.min_x + 1, r.max_y - r.min_y + 1, |x, y| {
                    let owner = labels.get_pixel(r.min_x + x, r.min_y + y).0[0];
                    Luma([if owner == label { 255 } else { 0 }])
                });
                let score = self.score(&mut r.values, level, foreground_mean);
                InstanceMask::cropped(mask, r.min_x, r.min_y, score)
            })
            .collect();

        Ok(instances)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;
    use imageproc::drawing::draw_filled_circle_mut;

    use super::*;

    fn two_disks(background: u8, disk: u8) -> RgbImage {
        let mut img = RgbImage::from_pixel(120, 80, Rgb([background; 3]));
        draw_filled_circle_mut(&mut img, (30, 40), 15, Rgb([disk; 3]));
        draw_filled_circle_mut(&mut img, (85, 40), 20, Rgb([disk; 3]));
        img
    }

    fn sharp() -> ThresholdDetector {
        ThresholdDetector {
            blur_sigma: 0.0,
            threshold: ThresholdLevel::Fixed(128),
            ..ThresholdDetector::default()
        }
    }

    #[test]
    fn finds_bright_disks_in_raster_order() {
        let found = sharp().detect(&two_disks(0, 255)).unwrap();
        assert_eq!(found.len(), 2);
        // The left disk's top pixel comes first in raster order.
        assert!(found[0].offset_x < found[1].offset_x);
        for instance in &found {
            assert!((instance.score - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn mask_crop_matches_disk_extent() {
        let found = sharp().detect(&two_disks(0, 255)).unwrap();
        let left = &found[0];
        assert_eq!((left.offset_x, left.offset_y), (15, 25));
        assert_eq!((left.mask.width(), left.mask.height()), (31, 31));
        assert!(left.pixel_count() > 600);
    }

    #[test]
    fn finds_dark_disks_when_configured() {
        let detector = ThresholdDetector {
            foreground: Foreground::Dark,
            ..sharp()
        };
        let found = detector.detect(&two_disks(255, 0)).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn otsu_separates_two_level_image() {
        let detector = ThresholdDetector {
            blur_sigma: 0.0,
            ..ThresholdDetector::default()
        };
        let found = detector.detect(&two_disks(20, 220)).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn small_regions_are_dropped() {
        let mut img = two_disks(0, 255);
        img.put_pixel(5, 5, Rgb([255; 3]));
        let found = sharp().detect(&img).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn faint_region_scores_lower() {
        let mut img = RgbImage::from_pixel(120, 80, Rgb([0; 3]));
        draw_filled_circle_mut(&mut img, (30, 40), 15, Rgb([255; 3]));
        draw_filled_circle_mut(&mut img, (85, 40), 15, Rgb([140; 3]));
        let found = sharp().detect(&img).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].score > 0.99);
        assert!(found[1].score < 0.2, "score={}", found[1].score);
    }

    #[test]
    fn default_detector_is_confident_on_clean_grains() {
        let cutoff = crate::types::AnalysisConfig::default().min_detection_score;
        for (background, disk) in [(0, 255), (20, 230), (40, 200)] {
            let found = ThresholdDetector::default()
                .detect(&two_disks(background, disk))
                .unwrap();
            assert_eq!(found.len(), 2, "bg={background} fg={disk}");
            for instance in &found {
                assert!(
                    instance.score >= cutoff,
                    "bg={background} fg={disk} score={}",
                    instance.score
                );
            }
        }
    }

    #[test]
    fn dark_grains_score_against_dark_class_mean() {
        let detector = ThresholdDetector {
            foreground: Foreground::Dark,
            ..ThresholdDetector::default()
        };
        let found = detector.detect(&two_disks(210, 60)).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|m| m.score > 0.95), "{found:?}");
    }

    #[test]
    fn empty_image_is_an_error() {
        let img = RgbImage::new(0, 0);
        assert!(matches!(
            sharp().detect(&img),
            Err(DetectorError::EmptyImage)
        ));
    }

    #[test]
    fn blank_image_has_no_detections() {
        let img = RgbImage::from_pixel(20, 20, Rgb([0; 3]));
        assert!(sharp().detect(&img).unwrap().is_empty());
    }

    #[test]
    fn detector_model_round_trips_through_json() {
        let json = r#"{"kind": "threshold", "threshold": {"fixed": 90}, "foreground": "dark"}"#;
        let model: DetectorModel = serde_json::from_str(json).unwrap();
        let DetectorModel::Threshold(ref detector) = model;
        assert_eq!(detector.threshold, ThresholdLevel::Fixed(90));
        assert_eq!(detector.foreground, Foreground::Dark);
        assert_eq!(detector.min_region_pixels, 64);

        let back: DetectorModel =
            serde_json::from_str(&serde_json::to_string(&model).unwrap()).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn detector_model_rejects_unknown_kind() {
        let json = r#"{"kind": "mask_rcnn"}"#;
        assert!(serde_json::from_str::<DetectorModel>(json).is_err());
    }
}
