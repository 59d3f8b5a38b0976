//! Aggregate segment counts and CV statistics over a batch of results

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{ClassificationResult, Segment};

/// Count and CV range of one segment
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentStats {
    pub count: usize,
    cv_count: usize,
    cv_sum: f64,
    pub cv_min: Option<f64>,
    pub cv_max: Option<f64>,
}

impl SegmentStats {
    fn add(&mut self, cv: Option<f64>) {
        self.count += 1;
        if let Some(cv) = cv {
            self.cv_count += 1;
            self.cv_sum += cv;
            self.cv_min = Some(self.cv_min.map_or(cv, |m| m.min(cv)));
            self.cv_max = Some(self.cv_max.map_or(cv, |m| m.max(cv)));
        }
    }

    /// Mean CV of the segment; `None` for an empty or unclassified segment
    pub fn cv_mean(&self) -> Option<f64> {
        (self.cv_count > 0).then(|| self.cv_sum / self.cv_count as f64)
    }
}

/// Distribution of a batch across segments
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSummary {
    pub total: usize,
    stats: [SegmentStats; 4],
    pub generated_at: DateTime<Utc>,
}

impl SegmentSummary {
    pub fn stats(&self, segment: Segment) -> &SegmentStats {
        &self.stats[segment.index()]
    }

    pub fn count(&self, segment: Segment) -> usize {
        self.stats(segment).count
    }

    /// Share of products in `segment`, in percent, rounded half-to-even
    /// to two decimals. Zero for an empty batch.
    pub fn percentage(&self, segment: Segment) -> f64 {
        percent_half_even(self.count(segment), self.total)
    }

    /// Presentation form with rounded percentages
    pub fn view(&self) -> SummaryView {
        SummaryView {
            total: self.total,
            generated_at: self.generated_at,
            segments: Segment::ALL
                .iter()
                .map(|&segment| {
                    let stats = self.stats(segment);
                    SegmentView {
                        segment,
                        count: stats.count,
                        percentage: self.percentage(segment),
                        avg_cv: stats.cv_mean().map(|v| round_dp(v, 4)),
                        min_cv: stats.cv_min.map(|v| round_dp(v, 4)),
                        max_cv: stats.cv_max.map(|v| round_dp(v, 4)),
                    }
                })
                .collect(),
        }
    }
}

/// Serializable summary as handed to a result sink
#[derive(Debug, Clone, Serialize)]
pub struct SummaryView {
    pub total: usize,
    pub generated_at: DateTime<Utc>,
    pub segments: Vec<SegmentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentView {
    pub segment: Segment,
    pub count: usize,
    pub percentage: f64,
    pub avg_cv: Option<f64>,
    pub min_cv: Option<f64>,
    pub max_cv: Option<f64>,
}

/// Summarize classification results
///
/// Unclassified products count towards the total, so the shares of X, Y
/// and Z are never inflated by products that could not be classified.
pub fn summarize(results: &[ClassificationResult], generated_at: DateTime<Utc>) -> SegmentSummary {
    let mut stats = [SegmentStats::default(); 4];
    for result in results {
        stats[result.segment.index()].add(result.cv);
    }

    let summary = SegmentSummary {
        total: results.len(),
        stats,
        generated_at,
    };

    debug_assert_eq!(
        summary.stats.iter().map(|s| s.count).sum::<usize>(),
        summary.total,
        "segment counts must add up to the number of results"
    );

    summary
}

/// `count / total * 100` rounded half-to-even to two decimals, computed on
/// integers so ties are exact
fn percent_half_even(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }

    let numerator = count as u128 * 10_000;
    let total = total as u128;
    let mut hundredths = numerator / total;
    let twice_remainder = (numerator % total) * 2;

    if twice_remainder > total || (twice_remainder == total && hundredths % 2 == 1) {
        hundredths += 1;
    }

    hundredths as f64 / 100.0
}

/// Round half-to-even at `dp` decimal places
pub(crate) fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round_ties_even() / factor
}
