//! Coefficient-of-variation classification of a single demand record

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::DemandRecord;
use crate::error::SegmentationError;
use crate::preprocess::Preprocessing;

/// Upper CV bound of the X segment
pub const DEFAULT_X_THRESHOLD: f64 = 0.10;
/// Upper CV bound of the Y segment
pub const DEFAULT_Y_THRESHOLD: f64 = 0.25;

/// Demand-variability segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Segment {
    /// Stable demand
    X,
    /// Moderately variable demand
    Y,
    /// Erratic demand
    Z,
    /// CV cannot be computed for this product
    Unclassified,
}

impl Segment {
    pub const ALL: [Segment; 4] = [Segment::X, Segment::Y, Segment::Z, Segment::Unclassified];

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::X => "X",
            Segment::Y => "Y",
            Segment::Z => "Z",
            Segment::Unclassified => "UNCLASSIFIED",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Segment::X => 0,
            Segment::Y => 1,
            Segment::Z => 2,
            Segment::Unclassified => 3,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a product ended up in [`Segment::Unclassified`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiedReason {
    /// Fewer than two usable periods, so no sample standard deviation
    InsufficientPeriods,
    /// Mean demand is zero, so CV is undefined
    ZeroMean,
}

impl UnclassifiedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnclassifiedReason::InsufficientPeriods => "insufficient_periods",
            UnclassifiedReason::ZeroMean => "zero_mean",
        }
    }
}

/// CV cut-offs between segments, expressed as fractions
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    /// CV <= low is X
    low: f64,
    /// low < CV <= high is Y, above is Z
    high: f64,
}

impl Thresholds {
    pub fn new(low: f64, high: f64) -> Result<Self, SegmentationError> {
        if !low.is_finite() || !high.is_finite() || low <= 0.0 || low >= high {
            return Err(SegmentationError::InvalidThresholdConfig { low, high });
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    /// Boundaries go to the more stable segment
    pub fn segment_for(&self, value: f64) -> Segment {
        if value <= self.low {
            Segment::X
        } else if value <= self.high {
            Segment::Y
        } else {
            Segment::Z
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: DEFAULT_X_THRESHOLD,
            high: DEFAULT_Y_THRESHOLD,
        }
    }
}

/// Classification of one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub product_id: String,
    pub mean: f64,
    /// Sample standard deviation; `None` with fewer than two periods
    pub std_dev: Option<f64>,
    /// Coefficient of variation; `None` whenever the segment is unclassified
    pub cv: Option<f64>,
    pub segment: Segment,
    pub reason: Option<UnclassifiedReason>,
    /// Periods used after preprocessing
    pub data_points: usize,
}

impl ClassificationResult {
    pub fn is_classified(&self) -> bool {
        self.segment != Segment::Unclassified
    }
}

/// Classify a single demand record
///
/// # Arguments
/// * `record` - Demand history for one product
/// * `thresholds` - Validated segment cut-offs
/// * `preprocessing` - Series transforms applied before the statistics
///
/// # Returns
/// * `ClassificationResult`, or `InvalidDemandData` if the record breaks
///   its invariants
pub fn classify_record(
    record: &DemandRecord,
    thresholds: &Thresholds,
    preprocessing: &Preprocessing,
) -> Result<ClassificationResult, SegmentationError> {
    record.validate()?;

    let values = preprocessing.apply(&record.quantities());
    let data_points = values.len();

    // statistics run on values divided by the series maximum, so large
    // finite quantities cannot overflow
    let scale = scale_of(&values);
    let scaled: Vec<f64> = values.iter().map(|v| v / scale).collect();
    let scaled_mean = mean(&scaled);
    let mean = scaled_mean * scale;

    let unclassified = |std_dev: Option<f64>, reason: UnclassifiedReason| ClassificationResult {
        product_id: record.product_id.clone(),
        mean,
        std_dev,
        cv: None,
        segment: Segment::Unclassified,
        reason: Some(reason),
        data_points,
    };

    if data_points < preprocessing.required_periods() {
        let std_dev = (data_points >= 2).then(|| sample_std_dev(&scaled, scaled_mean) * scale);
        return Ok(unclassified(std_dev, UnclassifiedReason::InsufficientPeriods));
    }

    let scaled_std = sample_std_dev(&scaled, scaled_mean);
    let std_dev = scaled_std * scale;
    if scaled_mean == 0.0 {
        return Ok(unclassified(Some(std_dev), UnclassifiedReason::ZeroMean));
    }

    let cv = scaled_std / scaled_mean;
    let comparison = if preprocessing.use_cv_squared {
        cv * cv
    } else {
        cv
    };

    Ok(ClassificationResult {
        product_id: record.product_id.clone(),
        mean,
        std_dev: Some(std_dev),
        cv: Some(cv),
        segment: thresholds.segment_for(comparison),
        reason: None,
        data_points,
    })
}

fn scale_of(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(0.0, f64::max);
    if max > 0.0 {
        max
    } else {
        1.0
    }
}

/// Mean shifted by the first value, so a constant series yields that value
/// exactly and its deviations are exactly zero
fn mean(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };
    first + values.iter().map(|v| v - first).sum::<f64>() / values.len() as f64
}

/// Bessel-corrected standard deviation; needs at least two values
fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}
