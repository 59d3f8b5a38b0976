//! Result sinks: CSV table, JSON report and planning-system import rows

use std::fs::File;
use std::io::Write;
use std::path::Path;

use polars::prelude::*;
use serde::Serialize;

use crate::classify::ClassificationResult;
use crate::engine::{SegmentationReport, SkippedRecord};
use crate::summary::{round_dp, SummaryView};

/// Output format for segmentation results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Pick the format from a file extension, defaulting to CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Csv,
        }
    }
}

/// Build a DataFrame with one row per product: every result, then every
/// skipped record. `status` is `classified`, `unclassified` or `skipped`
/// and `reason` says why a row has no segment.
pub fn report_to_dataframe(report: &SegmentationReport) -> crate::Result<DataFrame> {
    let results = &report.results;
    let skipped = &report.skipped;
    let n_skipped = skipped.len();

    let product_ids: Vec<&str> = results
        .iter()
        .map(|r| r.product_id.as_str())
        .chain(skipped.iter().map(|s| s.product_id.as_str()))
        .collect();
    let segments: Vec<Option<&str>> = results
        .iter()
        .map(|r| Some(r.segment.as_str()))
        .chain(empty_cells(n_skipped))
        .collect();
    let means: Vec<Option<f64>> = results
        .iter()
        .map(|r| Some(r.mean))
        .chain(empty_cells(n_skipped))
        .collect();
    let std_devs: Vec<Option<f64>> = results
        .iter()
        .map(|r| r.std_dev)
        .chain(empty_cells(n_skipped))
        .collect();
    let cvs: Vec<Option<f64>> = results
        .iter()
        .map(|r| r.cv)
        .chain(empty_cells(n_skipped))
        .collect();
    let data_points: Vec<Option<u64>> = results
        .iter()
        .map(|r| Some(r.data_points as u64))
        .chain(empty_cells(n_skipped))
        .collect();
    let statuses: Vec<&str> = results
        .iter()
        .map(|r| if r.is_classified() { "classified" } else { "unclassified" })
        .chain(skipped.iter().map(|_| "skipped"))
        .collect();
    let reasons: Vec<Option<&str>> = results
        .iter()
        .map(|r| r.reason.map(|reason| reason.as_str()))
        .chain(skipped.iter().map(|s| Some(s.reason.as_str())))
        .collect();

    let df = DataFrame::new(vec![
        Series::new("product_id", product_ids),
        Series::new("segment", segments),
        Series::new("mean_demand", means),
        Series::new("std_deviation", std_devs),
        Series::new("cv", cvs),
        Series::new("data_points", data_points),
        Series::new("status", statuses),
        Series::new("reason", reasons),
    ])?;

    Ok(df)
}

fn empty_cells<T>(count: usize) -> impl Iterator<Item = Option<T>> {
    std::iter::repeat_with(|| None).take(count)
}

/// Write the report as CSV; undefined values are left empty
pub fn write_csv(report: &SegmentationReport, output_path: &Path) -> crate::Result<()> {
    let mut df = report_to_dataframe(report)?;
    let mut file = File::create(output_path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    status: &'static str,
    method: &'a str,
    summary: SummaryView,
    results: &'a [ClassificationResult],
    skipped: &'a [SkippedRecord],
}

/// Render a report as pretty-printed JSON
pub fn report_to_json(report: &SegmentationReport, method: &str) -> crate::Result<String> {
    let body = JsonReport {
        status: if report.is_complete() { "success" } else { "partial" },
        method,
        summary: report.summary.view(),
        results: &report.results,
        skipped: &report.skipped,
    };
    Ok(serde_json::to_string_pretty(&body)?)
}

pub fn write_json(report: &SegmentationReport, method: &str, output_path: &Path) -> crate::Result<()> {
    let mut file = File::create(output_path)?;
    file.write_all(report_to_json(report, method)?.as_bytes())?;
    Ok(())
}

/// Write results in the format implied by the file extension
pub fn write_report(report: &SegmentationReport, method: &str, output_path: &Path) -> crate::Result<()> {
    match ExportFormat::from_path(output_path) {
        ExportFormat::Csv => write_csv(report, output_path),
        ExportFormat::Json => write_json(report, method, output_path),
    }?;
    if !report.is_complete() {
        tracing::warn!(
            path = %output_path.display(),
            skipped = report.skipped.len(),
            "exported report is partial"
        );
    }
    tracing::info!(path = %output_path.display(), "results exported");
    Ok(())
}

/// Master-data row accepted by the planning system's import interface
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanningImportRow {
    #[serde(rename = "PRDID")]
    pub product_id: String,
    #[serde(rename = "XYZ_SEGMENT")]
    pub segment: String,
    #[serde(rename = "CV_VALUE")]
    pub cv: Option<f64>,
    #[serde(rename = "MEAN_DEMAND")]
    pub mean_demand: f64,
    #[serde(rename = "STD_DEV")]
    pub std_dev: Option<f64>,
}

/// Convert results to import rows: CV at 4 decimals, mean and std at 2
pub fn to_planning_rows(results: &[ClassificationResult]) -> Vec<PlanningImportRow> {
    results
        .iter()
        .map(|r| PlanningImportRow {
            product_id: r.product_id.clone(),
            segment: r.segment.to_string(),
            cv: r.cv.map(|v| round_dp(v, 4)),
            mean_demand: round_dp(r.mean, 2),
            std_dev: r.std_dev.map(|v| round_dp(v, 2)),
        })
        .collect()
}

pub fn write_planning_rows(results: &[ClassificationResult], output_path: &Path) -> crate::Result<()> {
    let rows = to_planning_rows(results);
    let file = File::create(output_path)?;
    serde_json::to_writer_pretty(file, &rows)?;
    tracing::info!(path = %output_path.display(), rows = rows.len(), "planning import rows written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DemandRecord;
    use crate::engine::SegmentationEngine;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn report() -> SegmentationReport {
        let records = vec![
            DemandRecord::from_quantities("A", &[100.0, 100.0, 100.0, 100.0]),
            DemandRecord::from_quantities("B", &[10.0, 50.0, 90.0, 5.0]),
            DemandRecord::from_quantities("C", &[0.0, 0.0, 0.0]),
            DemandRecord::from_quantities("BAD", &[-1.0]),
        ];
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        SegmentationEngine::default().run_at(&records, ts).unwrap()
    }

    #[test]
    fn test_report_to_dataframe() {
        let df = report_to_dataframe(&report()).unwrap();
        assert_eq!(df.shape(), (4, 8));
        assert_eq!(df.column("cv").unwrap().null_count(), 2);
        assert_eq!(df.column("segment").unwrap().null_count(), 1);

        let status = df.column("status").unwrap().str().unwrap();
        assert_eq!(status.get(0), Some("classified"));
        assert_eq!(status.get(2), Some("unclassified"));
        assert_eq!(status.get(3), Some("skipped"));

        let reason = df.column("reason").unwrap().str().unwrap();
        assert_eq!(reason.get(0), None);
        assert_eq!(reason.get(2), Some("zero_mean"));
        assert!(reason.get(3).unwrap().contains("negative quantity"));
    }

    #[test]
    fn test_write_csv() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("segments.csv");
        write_report(&report(), "cv", &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "product_id,segment,mean_demand,std_deviation,cv,data_points,status,reason"
        );
        assert!(lines.next().unwrap().starts_with("A,X,100"));
        assert!(content.contains("C,UNCLASSIFIED,0"));
        assert!(content.contains(",unclassified,zero_mean"));

        // the skipped record is still listed, with no statistics
        let bad = content.lines().last().unwrap();
        assert!(bad.starts_with("BAD,,,,,,skipped,"));
        assert_eq!(content.lines().count(), 5);
    }

    #[test]
    fn test_json_report() {
        let json = report_to_json(&report(), "cv").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "partial");
        assert_eq!(value["method"], "cv");
        assert_eq!(value["summary"]["total"], 3);
        assert_eq!(value["results"][1]["segment"], "Z");
        assert!(value["results"][2]["cv"].is_null());
        assert_eq!(value["results"][2]["reason"], "zero_mean");
        assert_eq!(value["skipped"][0]["product_id"], "BAD");
        assert_eq!(value["summary"]["generated_at"], "2024-03-01T00:00:00Z");
    }

    #[test]
    fn test_planning_rows() {
        let rows = to_planning_rows(&report().results);
        assert_eq!(rows[1].product_id, "B");
        assert_eq!(rows[1].segment, "Z");
        assert_eq!(rows[1].cv, Some(1.0235));
        assert_eq!(rows[1].mean_demand, 38.75);
        assert_eq!(rows[1].std_dev, Some(39.66));

        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["PRDID"], "A");
        assert_eq!(json["XYZ_SEGMENT"], "X");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a.JSON")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("a.csv")), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("a")), ExportFormat::Csv);
    }
}
