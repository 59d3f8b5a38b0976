//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::classify::{Thresholds, DEFAULT_X_THRESHOLD, DEFAULT_Y_THRESHOLD};
use crate::data::ColumnMapping;
use crate::engine::{BatchPolicy, EngineConfig};
use crate::model::KMeansConfig;
use crate::preprocess::Preprocessing;

/// Segmentation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Fixed CV thresholds
    Cv,
    /// K-Means clustering of CV values into three segments
    Kmeans,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Cv => "coefficient_of_variation",
            Method::Kmeans => "kmeans_clustering",
        }
    }
}

/// Handling of invalid demand records
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Skip invalid products and list them in the report
    Skip,
    /// Abort on the first invalid product
    FailFast,
}

impl From<PolicyArg> for BatchPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Skip => BatchPolicy::SkipAndReport,
            PolicyArg::FailFast => BatchPolicy::FailFast,
        }
    }
}

/// XYZ demand-variability segmentation using the coefficient of variation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the long-format demand CSV (product, period, quantity)
    #[arg(short, long, env = "XYZ_INPUT", default_value = "demand.csv")]
    pub input: PathBuf,

    /// Product identifier column
    #[arg(long, default_value = "product_id")]
    pub product_column: String,

    /// Period column (integer period index)
    #[arg(long, default_value = "period")]
    pub period_column: String,

    /// Demand quantity column
    #[arg(long, default_value = "quantity")]
    pub quantity_column: String,

    /// Extra key columns to segment by, e.g. "location" or "location,customer"
    #[arg(long, value_delimiter = ',')]
    pub group_by: Vec<String>,

    /// Segmentation method
    #[arg(short, long, value_enum, default_value = "cv")]
    pub method: Method,

    /// Upper CV bound of segment X, as a fraction
    #[arg(long, env = "XYZ_X_THRESHOLD", default_value_t = DEFAULT_X_THRESHOLD)]
    pub x_threshold: f64,

    /// Upper CV bound of segment Y, as a fraction
    #[arg(long, env = "XYZ_Y_THRESHOLD", default_value_t = DEFAULT_Y_THRESHOLD)]
    pub y_threshold: f64,

    /// Handling of invalid products
    #[arg(long, value_enum, env = "XYZ_POLICY", default_value = "skip")]
    pub policy: PolicyArg,

    /// Exclude zero-demand periods
    #[arg(long)]
    pub remove_zeros: bool,

    /// Classify on CV squared instead of CV
    #[arg(long)]
    pub cv_squared: bool,

    /// Drop points with a z-score at or above this value (1.5 - 5.0)
    #[arg(long)]
    pub outlier_z: Option<f64>,

    /// Remove seasonality with this season length before computing CV
    #[arg(long)]
    pub seasonal_period: Option<usize>,

    /// Fewest usable periods a series needs to be classified
    #[arg(long)]
    pub min_periods: Option<usize>,

    /// Output path for results (.csv or .json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output path for planning-system import rows (JSON)
    #[arg(long)]
    pub ibp_output: Option<PathBuf>,

    /// Output path for the PNG charts
    #[arg(long)]
    pub chart: Option<String>,

    /// Recommend thresholds from percentiles, e.g. "33,67"
    #[arg(short, long)]
    pub recommend: Option<String>,

    /// Seed for K-Means initialisation
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Log filter, overridden by RUST_LOG
    #[arg(long, env = "XYZ_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Validated engine configuration
    pub fn engine_config(&self) -> crate::Result<EngineConfig> {
        let thresholds = Thresholds::new(self.x_threshold, self.y_threshold)?;
        let preprocessing = Preprocessing {
            remove_zeros: self.remove_zeros,
            outlier_z: self.outlier_z,
            seasonal_period: self.seasonal_period,
            use_cv_squared: self.cv_squared,
            min_periods: self.min_periods,
        };
        preprocessing.validate()?;

        Ok(EngineConfig {
            thresholds,
            preprocessing,
            policy: self.policy.into(),
        })
    }

    pub fn column_mapping(&self) -> ColumnMapping {
        ColumnMapping {
            product: self.product_column.clone(),
            period: self.period_column.clone(),
            quantity: self.quantity_column.clone(),
            group_by: self.group_by.clone(),
        }
    }

    pub fn kmeans_config(&self) -> KMeansConfig {
        KMeansConfig {
            seed: self.seed,
            ..KMeansConfig::default()
        }
    }

    /// Parse percentiles from the recommend string
    /// Expected format: "low,high"
    pub fn parse_percentiles(&self) -> crate::Result<Option<(f64, f64)>> {
        if let Some(ref recommend_str) = self.recommend {
            let parts: Vec<&str> = recommend_str.split(',').collect();
            if parts.len() != 2 {
                anyhow::bail!("Recommend percentiles must be in format 'low,high'");
            }

            let low: f64 = parts[0]
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid low percentile: {}", parts[0]))?;
            let high: f64 = parts[1]
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid high percentile: {}", parts[1]))?;

            Ok(Some((low, high)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentationError;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["xyzforge", "--input", "demand.csv"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_percentiles() {
        let mut args = args(&["--recommend", "33,67"]);
        assert_eq!(args.parse_percentiles().unwrap(), Some((33.0, 67.0)));

        args.recommend = None;
        assert_eq!(args.parse_percentiles().unwrap(), None);

        args.recommend = Some("invalid".to_string());
        assert!(args.parse_percentiles().is_err());

        args.recommend = Some("10,abc".to_string());
        assert!(args.parse_percentiles().is_err());
    }

    #[test]
    fn test_default_engine_config() {
        let config = args(&[]).engine_config().unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.thresholds.low(), 0.10);
        assert_eq!(config.thresholds.high(), 0.25);
        assert_eq!(config.policy, BatchPolicy::SkipAndReport);
    }

    #[test]
    fn test_engine_config_from_flags() {
        let config = args(&[
            "--x-threshold",
            "0.5",
            "--y-threshold",
            "1.0",
            "--policy",
            "fail-fast",
            "--remove-zeros",
            "--seasonal-period",
            "12",
        ])
        .engine_config()
        .unwrap();

        assert_eq!(config.thresholds.low(), 0.5);
        assert_eq!(config.policy, BatchPolicy::FailFast);
        assert!(config.preprocessing.remove_zeros);
        assert_eq!(config.preprocessing.seasonal_period, Some(12));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let err = args(&["--x-threshold", "0.3", "--y-threshold", "0.2"])
            .engine_config()
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SegmentationError>(),
            Some(SegmentationError::InvalidThresholdConfig { .. })
        ));
    }

    #[test]
    fn test_group_by_and_min_periods() {
        assert!(args(&[]).column_mapping().group_by.is_empty());

        let parsed = args(&["--group-by", "location,customer", "--min-periods", "12"]);
        assert_eq!(parsed.column_mapping().group_by, vec!["location", "customer"]);
        let config = parsed.engine_config().unwrap();
        assert_eq!(config.preprocessing.required_periods(), 12);

        assert!(args(&["--min-periods", "1"]).engine_config().is_err());
    }

    #[test]
    fn test_invalid_outlier_cutoff_rejected() {
        assert!(args(&["--outlier-z", "9"]).engine_config().is_err());
    }
}
