//! Visualization functions using Plotters for segmentation results

use std::path::{Path, PathBuf};

use plotters::prelude::*;

use crate::classify::{ClassificationResult, Segment};
use crate::summary::SegmentSummary;

/// Colors for X, Y, Z and unclassified, in `Segment::ALL` order
static SEGMENT_COLORS: [RGBColor; 4] = [GREEN, BLUE, RED, RGBColor(128, 128, 128)];

fn segment_color(segment: Segment) -> &'static RGBColor {
    &SEGMENT_COLORS[segment.index()]
}

/// Create scatter plot of mean demand against CV, colored by segment
///
/// # Arguments
/// * `results` - Classification results; unclassified products are not plotted
/// * `output_path` - Path to save the PNG plot
/// * `plot_title` - Title for the plot
pub fn create_cv_scatter(
    results: &[ClassificationResult],
    output_path: &str,
    plot_title: Option<&str>,
) -> crate::Result<()> {
    let title = plot_title.unwrap_or("XYZ Segmentation: Mean Demand vs Coefficient of Variation");

    let points: Vec<(f64, f64, Segment)> = results
        .iter()
        .filter_map(|r| r.cv.map(|cv| (r.mean, cv, r.segment)))
        .collect();

    // Plot bounds with some padding
    let mean_max = points.iter().map(|p| p.0).fold(0.0, f64::max) * 1.1 + 1.0;
    let cv_max = points.iter().map(|p| p.1).fold(0.0, f64::max) * 1.1 + 0.1;

    let root = BitMapBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..mean_max, 0f64..cv_max)?;

    chart
        .configure_mesh()
        .x_desc("Mean Demand")
        .y_desc("Coefficient of Variation")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for segment in [Segment::X, Segment::Y, Segment::Z] {
        let color = segment_color(segment);
        chart
            .draw_series(
                points
                    .iter()
                    .filter(|p| p.2 == segment)
                    .map(|&(mean, cv, _)| Circle::new((mean, cv), 4, color.filled())),
            )?
            .label(format!("Segment {}", segment))
            .legend(move |(x, y)| Rectangle::new([(x, y), (x + 10, y + 10)], color.filled()));
    }

    chart.configure_series_labels().draw()?;

    root.present()?;
    tracing::info!(path = output_path, "CV scatter plot saved");

    Ok(())
}

/// Create a bar chart of product counts per segment
pub fn create_segment_distribution_chart(
    summary: &SegmentSummary,
    output_path: &str,
) -> crate::Result<()> {
    let max_count = Segment::ALL
        .iter()
        .map(|&s| summary.count(s))
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    let root = BitMapBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Segment Distribution", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..(Segment::ALL.len() as f64), 0f64..(max_count * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Segment (X, Y, Z, Unclassified)")
        .y_desc("Number of Products")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (i, &segment) in Segment::ALL.iter().enumerate() {
        let count = summary.count(segment) as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(i as f64 + 0.1, 0.0), (i as f64 + 0.9, count)],
            segment_color(segment).filled(),
        )))?;
    }

    root.present()?;
    tracing::info!(path = output_path, "segment distribution chart saved");

    Ok(())
}

/// Print the segment table to the console
pub fn print_segment_summary(summary: &SegmentSummary) {
    println!("\n=== Segment Summary ===");
    println!("Total products: {}", summary.total);
    println!("Generated at: {}", summary.generated_at.to_rfc3339());
    println!();
    println!("  Segment      | Count | Share (%) | Avg CV | Min CV | Max CV");
    println!("  -------------|-------|-----------|--------|--------|-------");
    for segment in Segment::ALL {
        let stats = summary.stats(segment);
        let fmt_cv = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v));
        println!(
            "  {:12} | {:5} | {:9.2} | {:>6} | {:>6} | {:>6}",
            segment.as_str(),
            stats.count,
            summary.percentage(segment),
            fmt_cv(stats.cv_mean()),
            fmt_cv(stats.cv_min),
            fmt_cv(stats.cv_max),
        );
    }
}

/// Scatter and distribution chart paths for a base path. A base without
/// an extension gets `.png`; the distribution chart adds `_segments` to
/// the file stem.
pub fn chart_paths(base_output_path: &str) -> (PathBuf, PathBuf) {
    let base = Path::new(base_output_path);
    let scatter = if base.extension().is_some() {
        base.to_path_buf()
    } else {
        base.with_extension("png")
    };
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chart".to_string());
    let distribution = base.with_file_name(format!("{}_segments.png", stem));
    (scatter, distribution)
}

/// Generate both charts next to `base_output_path` and return their paths
pub fn generate_visualization_report(
    results: &[ClassificationResult],
    summary: &SegmentSummary,
    base_output_path: &str,
) -> crate::Result<(PathBuf, PathBuf)> {
    let (scatter, distribution) = chart_paths(base_output_path);

    create_cv_scatter(results, &scatter.to_string_lossy(), None)?;
    create_segment_distribution_chart(summary, &distribution.to_string_lossy())?;

    Ok((scatter, distribution))
}
