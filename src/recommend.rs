//! Data-driven threshold suggestions from the CV distribution of a batch

use serde::Serialize;

use crate::classify::{ClassificationResult, Thresholds};
use crate::error::SegmentationError;
use crate::summary::round_dp;

/// Minimum number of defined CV values needed to suggest thresholds
pub const MIN_PRODUCTS: usize = 3;

/// Descriptive statistics of the CV values used for a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CvStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdRecommendation {
    pub thresholds: Thresholds,
    pub cv_statistics: CvStatistics,
    pub items_analyzed: usize,
}

/// Suggest thresholds at the given percentiles of the observed CVs
///
/// # Arguments
/// * `results` - Classified products; unclassified ones are ignored
/// * `low_pct` - Percentile for the X/Y boundary, e.g. 33
/// * `high_pct` - Percentile for the Y/Z boundary, e.g. 67
///
/// # Returns
/// * A validated `Thresholds` pair with rounded CV statistics
pub fn recommend_thresholds(
    results: &[ClassificationResult],
    low_pct: f64,
    high_pct: f64,
) -> crate::Result<ThresholdRecommendation> {
    if !(low_pct > 0.0 && low_pct < high_pct && high_pct < 100.0) {
        anyhow::bail!(
            "Percentiles must satisfy 0 < low < high < 100, got {} and {}",
            low_pct,
            high_pct
        );
    }

    let mut cvs: Vec<f64> = results.iter().filter_map(|r| r.cv).collect();
    if cvs.len() < MIN_PRODUCTS {
        return Err(SegmentationError::InsufficientProducts {
            required: MIN_PRODUCTS,
            available: cvs.len(),
        }
        .into());
    }
    cvs.sort_by(f64::total_cmp);

    let low = round_dp(percentile(&cvs, low_pct), 4);
    let high = round_dp(percentile(&cvs, high_pct), 4);
    let thresholds = Thresholds::new(low, high)?;

    let mean = cvs.iter().sum::<f64>() / cvs.len() as f64;
    let cv_statistics = CvStatistics {
        min: round_dp(cvs[0], 4),
        max: round_dp(cvs[cvs.len() - 1], 4),
        mean: round_dp(mean, 4),
        median: round_dp(percentile(&cvs, 50.0), 4),
    };

    Ok(ThresholdRecommendation {
        thresholds,
        cv_statistics,
        items_analyzed: cvs.len(),
    })
}

/// Percentile of sorted data with linear interpolation between ranks
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
