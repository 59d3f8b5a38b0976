//! XyzForge: XYZ demand-variability segmentation
//!
//! Classifies products into stable (X), moderate (Y) and erratic (Z) demand
//! segments by the coefficient of variation of their demand history, and
//! summarizes the distribution of a batch.

pub mod classify;
pub mod cli;
pub mod data;
pub mod engine;
pub mod error;
pub mod export;
pub mod logging;
pub mod model;
pub mod preprocess;
pub mod recommend;
pub mod summary;
pub mod viz;

// Re-export public items for easier access
pub use classify::{classify_record, ClassificationResult, Segment, Thresholds, UnclassifiedReason};
pub use cli::Args;
pub use data::{load_demand_csv, ColumnMapping, DemandPoint, DemandRecord};
pub use engine::{BatchPolicy, EngineConfig, SegmentationEngine, SegmentationReport, SkippedRecord};
pub use error::SegmentationError;
pub use model::{segment_by_kmeans, KMeansConfig, KMeansSegmentation};
pub use preprocess::Preprocessing;
pub use recommend::{recommend_thresholds, ThresholdRecommendation};
pub use summary::{summarize, SegmentSummary};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
