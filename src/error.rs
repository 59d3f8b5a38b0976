//! Error types raised by the segmentation engine

use thiserror::Error;

/// Errors produced while validating or classifying demand data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentationError {
    /// A demand record is empty, out of order, or carries a quantity that is
    /// negative, missing or non-finite
    #[error("Invalid demand data for product '{product_id}': {reason}")]
    InvalidDemandData { product_id: String, reason: String },

    /// Segment thresholds do not satisfy 0 < low < high
    #[error("Invalid threshold config: low={low}, high={high} (expected 0 < low < high)")]
    InvalidThresholdConfig { low: f64, high: f64 },

    /// Not enough classifiable products for a population-level method
    #[error("Insufficient products: {available} classifiable, at least {required} required")]
    InsufficientProducts { required: usize, available: usize },
}

impl SegmentationError {
    pub(crate) fn invalid_data(product_id: &str, reason: impl Into<String>) -> Self {
        SegmentationError::InvalidDemandData {
            product_id: product_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Product identifier attached to a per-record failure
    pub fn product_id(&self) -> Option<&str> {
        match self {
            SegmentationError::InvalidDemandData { product_id, .. } => Some(product_id),
            _ => None,
        }
    }
}
