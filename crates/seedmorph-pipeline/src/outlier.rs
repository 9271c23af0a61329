//! Per-image outlier rejection using interquartile-range bands.
//!
//! For every [`Measurement`] the band `[Q1 - k·IQR, Q3 + k·IQR]` is
//! computed from the rows of one image, with `k` taken from
//! [`IqrMultipliers`]. Bounds are inclusive. Quartiles use linear
//! interpolation between closest ranks.
//!
//! Two policies are available (see [`IqrPolicy`]):
//!
//! - [`IqrPolicy::Sequential`] narrows the row set one measurement at a
//!   time, recomputing quartiles on whatever survived the previous pass.
//! - [`IqrPolicy::FixedBounds`] computes all eight bands from the
//!   original rows and keeps the rows inside every band.
//!
//! Sets of fewer than two rows pass through untouched: there is no
//! spread to measure.

use serde::{Deserialize, Serialize};

use crate::types::{FeatureRow, IqrMultipliers, IqrPolicy, Measurement};

/// Minimum number of rows for quartiles to mean anything.
pub const MIN_ROWS_TO_FILTER: usize = 2;

/// An inclusive inlier band for one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InlierBand {
    /// Lowest accepted value.
    pub low: f64,
    /// Highest accepted value.
    pub high: f64,
}

impl InlierBand {
    /// Whether `value` lies inside the band.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.low..=self.high).contains(&value)
    }
}

/// How many rows one measurement's band removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// The measurement whose band the rows fell outside of.
    pub measurement: Measurement,
    /// Number of rows removed.
    pub count: usize,
}

/// Result of filtering one image's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    /// Surviving rows, in their original order.
    pub kept: Vec<FeatureRow>,
    /// Rows removed per measurement, in filtering order. Measurements
    /// that removed nothing are omitted.
    pub rejections: Vec<Rejection>,
}

impl FilterOutcome {
    /// Total number of rows removed.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejections.iter().map(|r| r.count).sum()
    }
}

/// Quantile `q` (in `[0, 1]`) of ascending-sorted values, interpolating
/// linearly between the two closest ranks.
///
/// Returns `None` for an empty slice.
#[must_use]
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    #[allow(clippy::cast_precision_loss)]
    let position = q.clamp(0.0, 1.0) * last as f64;
    let lower = position.floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (lo, hi) = (lower as usize, position.ceil() as usize);
    let fraction = position - lower;
    Some((sorted[hi] - sorted[lo]).mul_add(fraction, sorted[lo]))
}

/// Compute the inlier band of `values` for multiplier `k`.
///
/// Returns `None` for an empty slice.
#[must_use]
pub fn inlier_band(values: &[f64], k: f64) -> Option<InlierBand> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25)?;
    let q3 = quantile(&sorted, 0.75)?;
    let iqr = q3 - q1;
    Some(InlierBand {
        low: k.mul_add(-iqr, q1),
        high: k.mul_add(iqr, q3),
    })
}

fn band_for(rows: &[FeatureRow], measurement: Measurement, k: f64) -> Option<InlierBand> {
    let values: Vec<f64> = rows.iter().map(|r| measurement.value(&r.shape)).collect();
    inlier_band(&values, k)
}

/// Reject the rows of one image that fall outside any measurement's band.
#[must_use]
pub fn filter_outliers(
    rows: Vec<FeatureRow>,
    multipliers: &IqrMultipliers,
    policy: IqrPolicy,
) -> FilterOutcome {
    if rows.len() < MIN_ROWS_TO_FILTER {
        return FilterOutcome {
            kept: rows,
            rejections: Vec::new(),
        };
    }

    match policy {
        IqrPolicy::Sequential => filter_sequential(rows, multipliers),
        IqrPolicy::FixedBounds => filter_fixed_bounds(rows, multipliers),
    }
}

fn filter_sequential(mut rows: Vec<FeatureRow>, multipliers: &IqrMultipliers) -> FilterOutcome {
    let mut rejections = Vec::new();

    for measurement in Measurement::ALL {
        let Some(band) = band_for(&rows, measurement, multipliers.get(measurement)) else {
            break;
        };
        let before = rows.len();
        rows.retain(|r| band.contains(measurement.value(&r.shape)));
        let count = before - rows.len();
        if count > 0 {
            rejections.push(Rejection { measurement, count });
        }
    }

    FilterOutcome {
        kept: rows,
        rejections,
    }
}

fn filter_fixed_bounds(rows: Vec<FeatureRow>, multipliers: &IqrMultipliers) -> FilterOutcome {
    let bands: Vec<(Measurement, InlierBand)> = Measurement::ALL
        .into_iter()
        .filter_map(|m| band_for(&rows, m, multipliers.get(m)).map(|b| (m, b)))
        .collect();

    let mut counts = [0_usize; Measurement::ALL.len()];
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows {
        // Attribute each rejected row to the first band it violates.
        match bands
            .iter()
            .position(|(m, band)| !band.contains(m.value(&row.shape)))
        {
            Some(idx) => counts[idx] += 1,
            None => kept.push(row),
        }
    }

    let rejections = bands
        .iter()
        .zip(counts)
        .filter(|&(_, count)| count > 0)
        .map(|(&(measurement, _), count)| Rejection { measurement, count })
        .collect();

    FilterOutcome { kept, rejections }
}
