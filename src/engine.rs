//! Batch orchestration: classify every record in parallel, then summarize

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classify::{classify_record, ClassificationResult, Thresholds};
use crate::data::DemandRecord;
use crate::error::SegmentationError;
use crate::preprocess::Preprocessing;
use crate::summary::{summarize, SegmentSummary};

/// What to do with records that fail validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchPolicy {
    /// Return the first invalid record, in input order, as the error
    FailFast,
    /// Leave invalid records out of the results and list them in `skipped`
    #[default]
    SkipAndReport,
}

/// Everything the engine needs; no process-wide state is consulted
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub preprocessing: Preprocessing,
    pub policy: BatchPolicy,
}

/// A record left out of the results under [`BatchPolicy::SkipAndReport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    pub product_id: String,
    pub reason: String,
}

/// Output of one segmentation run
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationReport {
    /// One result per valid record, in input order
    pub results: Vec<ClassificationResult>,
    /// Invalid records, in input order
    pub skipped: Vec<SkippedRecord>,
    pub summary: SegmentSummary,
}

impl SegmentationReport {
    /// True when every input record produced a result
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Stateless XYZ segmentation engine
#[derive(Debug, Clone, Default)]
pub struct SegmentationEngine {
    config: EngineConfig,
}

impl SegmentationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Segment a batch, stamping the summary with the current time
    pub fn run(&self, records: &[DemandRecord]) -> Result<SegmentationReport, SegmentationError> {
        self.run_at(records, Utc::now())
    }

    /// Segment a batch with an explicit summary timestamp. Identical input
    /// and timestamp always give an identical report.
    pub fn run_at(
        &self,
        records: &[DemandRecord],
        generated_at: DateTime<Utc>,
    ) -> Result<SegmentationReport, SegmentationError> {
        let EngineConfig {
            thresholds,
            preprocessing,
            policy,
        } = self.config;

        tracing::debug!(records = records.len(), ?policy, "classifying demand records");

        // collect() on an indexed parallel iterator keeps input order
        let outcomes: Vec<Result<ClassificationResult, SegmentationError>> = records
            .par_iter()
            .map(|record| classify_record(record, &thresholds, &preprocessing))
            .collect();

        let mut results = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();

        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(err) => match policy {
                    BatchPolicy::FailFast => return Err(err),
                    BatchPolicy::SkipAndReport => {
                        let product_id = err.product_id().unwrap_or_default().to_string();
                        tracing::warn!(product = %product_id, error = %err, "skipping invalid demand record");
                        skipped.push(SkippedRecord {
                            product_id,
                            reason: err.to_string(),
                        });
                    }
                },
            }
        }

        let summary = summarize(&results, generated_at);

        tracing::debug!(
            classified = results.len(),
            skipped = skipped.len(),
            "segmentation batch complete"
        );

        Ok(SegmentationReport {
            results,
            skipped,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Segment;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap()
    }

    fn batch() -> Vec<DemandRecord> {
        vec![
            DemandRecord::from_quantities("A", &[100.0, 100.0, 100.0, 100.0]),
            DemandRecord::from_quantities("BAD", &[5.0, -1.0]),
            DemandRecord::from_quantities("B", &[10.0, 50.0, 90.0, 5.0]),
            DemandRecord::from_quantities("C", &[0.0, 0.0, 0.0]),
            DemandRecord::new("EMPTY", vec![]),
        ]
    }

    #[test]
    fn test_skip_and_report() {
        let engine = SegmentationEngine::default();
        let report = engine.run_at(&batch(), ts()).unwrap();

        let ids: Vec<&str> = report.results.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(report.results[0].segment, Segment::X);
        assert_eq!(report.results[1].segment, Segment::Z);
        assert_eq!(report.results[2].segment, Segment::Unclassified);

        let skipped: Vec<&str> = report.skipped.iter().map(|s| s.product_id.as_str()).collect();
        assert_eq!(skipped, vec!["BAD", "EMPTY"]);
        assert!(!report.is_complete());

        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.count(Segment::Unclassified), 1);
    }

    #[test]
    fn test_fail_fast_returns_first_invalid_record() {
        let engine = SegmentationEngine::new(EngineConfig {
            policy: BatchPolicy::FailFast,
            ..EngineConfig::default()
        });
        let err = engine.run_at(&batch(), ts()).unwrap_err();
        assert_eq!(err.product_id(), Some("BAD"));
    }

    #[test]
    fn test_empty_batch() {
        let report = SegmentationEngine::default().run_at(&[], ts()).unwrap();
        assert!(report.results.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(report.summary.total, 0);
        assert_eq!(report.summary.percentage(Segment::X), 0.0);
    }

    #[test]
    fn test_run_is_repeatable() {
        let engine = SegmentationEngine::default();
        let first = engine.run_at(&batch(), ts()).unwrap();
        let second = engine.run_at(&batch(), ts()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_large_batch_keeps_order() {
        let records: Vec<DemandRecord> = (0..500)
            .map(|i| {
                let base = 10.0 + i as f64;
                DemandRecord::from_quantities(format!("P{i:04}"), &[base, base * 1.5, base * 0.5])
            })
            .collect();
        let report = SegmentationEngine::default().run(&records).unwrap();
        assert_eq!(report.results.len(), 500);
        for (record, result) in records.iter().zip(&report.results) {
            assert_eq!(record.product_id, result.product_id);
        }
    }
}
