//! Optional demand-series transforms applied before variability statistics

use serde::{Deserialize, Serialize};

/// Accepted range for the outlier z-score cut-off
pub const OUTLIER_Z_RANGE: (f64, f64) = (1.5, 5.0);

/// Series transforms run after validation. The default leaves the series
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Preprocessing {
    /// Drop zero-demand periods
    pub remove_zeros: bool,
    /// Drop points whose z-score reaches this cut-off
    pub outlier_z: Option<f64>,
    /// Season length for seasonal-index deseasonalisation
    pub seasonal_period: Option<usize>,
    /// Compare CV² rather than CV against the thresholds
    pub use_cv_squared: bool,
    /// Fewest usable periods a series needs to be classified
    pub min_periods: Option<usize>,
}

impl Preprocessing {
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(z) = self.outlier_z {
            let (lo, hi) = OUTLIER_Z_RANGE;
            if !(lo..=hi).contains(&z) {
                anyhow::bail!("Outlier z-score cut-off must be between {} and {}, got {}", lo, hi, z);
            }
        }
        if let Some(period) = self.seasonal_period {
            if period < 2 {
                anyhow::bail!("Seasonal period must be at least 2, got {}", period);
            }
        }
        if let Some(min) = self.min_periods {
            if min < 2 {
                anyhow::bail!("Minimum periods must be at least 2, got {}", min);
            }
        }
        Ok(())
    }

    /// Periods needed for a sample standard deviation, or more if configured
    pub fn required_periods(&self) -> usize {
        self.min_periods.unwrap_or(2).max(2)
    }

    /// Apply the configured transforms in order: deseasonalise, remove
    /// outliers, drop zeros
    pub fn apply(&self, quantities: &[f64]) -> Vec<f64> {
        let mut values = quantities.to_vec();

        if let Some(period) = self.seasonal_period {
            values = deseasonalize(&values, period);
        }
        if let Some(z) = self.outlier_z {
            values = remove_outliers(&values, z);
        }
        if self.remove_zeros {
            values.retain(|&v| v != 0.0);
        }

        values
    }
}

/// Divide each value by the seasonal index of its phase.
///
/// The index of a phase is the mean of that phase divided by the overall
/// mean. Series shorter than two full seasons, or with zero overall mean,
/// are returned unchanged.
pub fn deseasonalize(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period * 2 {
        return values.to_vec();
    }

    let overall = mean(values);
    if overall <= 0.0 {
        return values.to_vec();
    }

    let indices: Vec<f64> = (0..period)
        .map(|phase| {
            let phase_values: Vec<f64> = values.iter().skip(phase).step_by(period).copied().collect();
            mean(&phase_values) / overall
        })
        .collect();

    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let index = indices[i % period];
            // a phase with zero demand everywhere stays at zero
            if index > 0.0 {
                v / index
            } else {
                v
            }
        })
        .collect()
}

/// Keep values whose population z-score is below `threshold`.
/// A constant series has no outliers.
pub fn remove_outliers(values: &[f64], threshold: f64) -> Vec<f64> {
    if values.len() < 2 {
        return values.to_vec();
    }

    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    let sd = var.sqrt();
    if sd == 0.0 {
        return values.to_vec();
    }

    values
        .iter()
        .copied()
        .filter(|v| ((v - m) / sd).abs() < threshold)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        let values = [0.0, 10.0, 0.0, 1000.0];
        assert_eq!(Preprocessing::default().apply(&values), values.to_vec());
    }

    #[test]
    fn test_remove_zeros() {
        let prep = Preprocessing {
            remove_zeros: true,
            ..Preprocessing::default()
        };
        assert_eq!(prep.apply(&[0.0, 5.0, 0.0, 7.0]), vec![5.0, 7.0]);
    }

    #[test]
    fn test_remove_outliers() {
        let mut values = vec![10.0; 20];
        values.push(500.0);
        let cleaned = remove_outliers(&values, 3.0);
        assert_eq!(cleaned.len(), 20);
        assert!(cleaned.iter().all(|&v| v == 10.0));

        // constant series is untouched
        assert_eq!(remove_outliers(&[4.0, 4.0, 4.0], 1.5), vec![4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_deseasonalize_flattens_pure_seasonality() {
        let season = [50.0, 100.0, 150.0];
        let values: Vec<f64> = season.iter().cycle().take(9).copied().collect();
        let flat = deseasonalize(&values, 3);
        for v in flat {
            assert!((v - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_deseasonalize_short_series_unchanged() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(deseasonalize(&values, 3), values.to_vec());
    }

    #[test]
    fn test_validate_ranges() {
        let bad_z = Preprocessing {
            outlier_z: Some(0.5),
            ..Preprocessing::default()
        };
        assert!(bad_z.validate().is_err());

        let bad_period = Preprocessing {
            seasonal_period: Some(1),
            ..Preprocessing::default()
        };
        assert!(bad_period.validate().is_err());

        let ok = Preprocessing {
            remove_zeros: true,
            outlier_z: Some(3.0),
            seasonal_period: Some(12),
            use_cv_squared: true,
            min_periods: Some(12),
        };
        assert!(ok.validate().is_ok());

        let bad_min = Preprocessing {
            min_periods: Some(1),
            ..Preprocessing::default()
        };
        assert!(bad_min.validate().is_err());
        assert_eq!(Preprocessing::default().required_periods(), 2);
    }
}
