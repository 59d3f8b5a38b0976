//! XyzForge: XYZ demand segmentation CLI
//!
//! This is the main entrypoint that orchestrates data loading, segmentation,
//! export, visualization and threshold recommendation.

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use xyzforge::cli::Method;
use xyzforge::{
    export, load_demand_csv, logging, recommend_thresholds, segment_by_kmeans, viz, Args,
    SegmentationEngine, SegmentationReport,
};

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "xyzforge=debug"
    } else {
        args.log_level.as_str()
    };
    logging::init_logging(default_filter)?;

    // Validate configuration before touching any data
    let config = args.engine_config()?;
    let percentiles = args.parse_percentiles()?;

    if args.verbose {
        println!("XyzForge - XYZ Demand Segmentation");
        println!("==================================\n");
    }

    let start_time = Instant::now();

    // Step 1: Load demand history
    if args.verbose {
        println!("Step 1: Loading demand history");
        println!("  Input file: {}", args.input.display());
    }
    let records = load_demand_csv(&args.input, &args.column_mapping())
        .with_context(|| format!("failed to load demand data from {}", args.input.display()))?;
    println!("✓ Data loaded: {} products", records.len());

    // Step 2: Classify
    if args.verbose {
        println!("\nStep 2: Classifying products");
        println!(
            "  Thresholds: X <= {}, Y <= {}",
            config.thresholds.low(),
            config.thresholds.high()
        );
        println!("  Method: {}", args.method.as_str());
    }
    let segment_start = Instant::now();
    let engine = SegmentationEngine::new(config);
    let mut report = engine.run(&records)?;

    if args.method == Method::Kmeans {
        let clustered = segment_by_kmeans(&report.results, &args.kmeans_config())?;
        report = SegmentationReport {
            summary: xyzforge::summarize(&clustered.results, report.summary.generated_at),
            results: clustered.results,
            skipped: report.skipped,
        };
        if args.verbose {
            println!(
                "  Cluster centres (CV): X={:.3}, Y={:.3}, Z={:.3}",
                clustered.centroids[0], clustered.centroids[1], clustered.centroids[2]
            );
            println!("  Inertia: {:.4}", clustered.inertia);
        }
    }

    let with_cv = report.results.iter().filter(|r| r.cv.is_some()).count();
    println!(
        "✓ Segmentation complete: {} products segmented, {} with a defined CV",
        report.results.len(),
        with_cv
    );
    if args.verbose {
        println!("  Segmentation time: {:.2}s", segment_start.elapsed().as_secs_f64());
    }

    if !report.skipped.is_empty() {
        println!("\n⚠ {} products skipped:", report.skipped.len());
        for skipped in &report.skipped {
            println!("  {}: {}", skipped.product_id, skipped.reason);
        }
    }

    viz::print_segment_summary(&report.summary);

    // Step 3: Export
    if let Some(ref output) = args.output {
        export::write_report(&report, args.method.as_str(), output)?;
        println!("\nResults saved to: {}", output.display());
    }
    if let Some(ref ibp_output) = args.ibp_output {
        export::write_planning_rows(&report.results, ibp_output)?;
        println!("Planning import rows saved to: {}", ibp_output.display());
    }

    // Step 4: Charts
    if let Some(ref chart) = args.chart {
        let (scatter, distribution) =
            viz::generate_visualization_report(&report.results, &report.summary, chart)?;
        println!(
            "Charts saved to: {} and {}",
            scatter.display(),
            distribution.display()
        );
    }

    // Step 5: Threshold recommendation
    if let Some((low, high)) = percentiles {
        let recommendation = recommend_thresholds(&report.results, low, high)?;
        println!("\n=== Recommended Thresholds ===");
        println!(
            "X <= {:.4} (P{}), Y <= {:.4} (P{})",
            recommendation.thresholds.low(),
            low,
            recommendation.thresholds.high(),
            high
        );
        let stats = recommendation.cv_statistics;
        println!(
            "CV over {} products: min {:.4}, median {:.4}, mean {:.4}, max {:.4}",
            recommendation.items_analyzed, stats.min, stats.median, stats.mean, stats.max
        );
    }

    tracing::info!(
        elapsed_s = start_time.elapsed().as_secs_f64(),
        products = report.results.len(),
        skipped = report.skipped.len(),
        "pipeline complete"
    );
    if args.verbose {
        println!("\nTotal processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    }

    Ok(())
}
