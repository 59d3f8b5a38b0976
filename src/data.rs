//! Demand history model and CSV loading using Polars

use std::collections::HashMap;
use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SegmentationError;

/// One period of observed demand
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandPoint {
    /// Discrete time marker, e.g. a month index
    pub period: i64,
    /// Demand quantity for the period
    pub quantity: f64,
}

/// Demand history of a single product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandRecord {
    pub product_id: String,
    /// Ordered by strictly increasing period
    pub points: Vec<DemandPoint>,
}

impl DemandRecord {
    pub fn new(product_id: impl Into<String>, points: Vec<DemandPoint>) -> Self {
        Self {
            product_id: product_id.into(),
            points,
        }
    }

    /// Build a record from bare quantities, numbering periods from zero
    pub fn from_quantities(product_id: impl Into<String>, quantities: &[f64]) -> Self {
        let points = quantities
            .iter()
            .enumerate()
            .map(|(i, &quantity)| DemandPoint {
                period: i as i64,
                quantity,
            })
            .collect();
        Self::new(product_id, points)
    }

    pub fn quantities(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.quantity).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Check the record invariants: at least one point, finite non-negative
    /// quantities and strictly increasing periods
    pub fn validate(&self) -> Result<(), SegmentationError> {
        if self.points.is_empty() {
            return Err(SegmentationError::invalid_data(
                &self.product_id,
                "demand series is empty",
            ));
        }

        let mut previous: Option<i64> = None;
        for point in &self.points {
            if !point.quantity.is_finite() {
                return Err(SegmentationError::invalid_data(
                    &self.product_id,
                    format!("missing or non-finite quantity at period {}", point.period),
                ));
            }
            if point.quantity < 0.0 {
                return Err(SegmentationError::invalid_data(
                    &self.product_id,
                    format!("negative quantity {} at period {}", point.quantity, point.period),
                ));
            }
            if let Some(prev) = previous {
                if point.period <= prev {
                    return Err(SegmentationError::invalid_data(
                        &self.product_id,
                        format!("period {} does not follow period {}", point.period, prev),
                    ));
                }
            }
            previous = Some(point.period);
        }

        Ok(())
    }
}

/// Joins the product and grouping attribute values into one series key
pub const KEY_SEPARATOR: &str = "/";

/// Names of the CSV columns holding product, period and quantity
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub product: String,
    pub period: String,
    pub quantity: String,
    /// Extra key columns, e.g. location or customer. Each distinct
    /// combination becomes its own series, keyed `product/value/...`.
    /// Empty rolls every row up to product level.
    pub group_by: Vec<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            product: "product_id".to_string(),
            period: "period".to_string(),
            quantity: "quantity".to_string(),
            group_by: Vec::new(),
        }
    }
}

/// Load a long-format demand CSV into one record per product, or per
/// product and grouping attributes
///
/// # Arguments
/// * `file_path` - Path to the CSV file
/// * `columns` - Column names for product, period, quantity and grouping
///
/// # Returns
/// * Records in first-appearance order, each sorted by period. Rows sharing
///   a (key, period) pair are summed; missing quantities become NaN so
///   that the engine reports the product instead of reading zero demand.
pub fn load_demand_csv(
    file_path: impl AsRef<Path>,
    columns: &ColumnMapping,
) -> crate::Result<Vec<DemandRecord>> {
    let file_path = file_path.as_ref();

    let mut selection = vec![
        col(&columns.product)
            .cast(DataType::String)
            .alias("product_id"),
        col(&columns.period).cast(DataType::Int64).alias("period"),
        col(&columns.quantity)
            .cast(DataType::Float64)
            .alias("quantity"),
    ];
    for (i, name) in columns.group_by.iter().enumerate() {
        selection.push(col(name).cast(DataType::String).alias(&group_alias(i)));
    }

    let df = LazyCsvReader::new(file_path)
        .with_has_header(true)
        .finish()?
        .filter(col(&columns.product).is_not_null())
        .select(selection)
        .collect()?;

    let product_ids = df.column("product_id")?.str()?;
    let periods = df.column("period")?.i64()?;
    let quantities = df.column("quantity")?.f64()?;
    let group_values = (0..columns.group_by.len())
        .map(|i| df.column(&group_alias(i))?.str())
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut records: Vec<DemandRecord> = Vec::new();

    for (row, ((product_id, period), quantity)) in product_ids
        .into_iter()
        .zip(periods.into_iter())
        .zip(quantities.into_iter())
        .enumerate()
    {
        let Some(product_id) = product_id else {
            continue;
        };
        let Some(period) = period else {
            anyhow::bail!(
                "Row {} for product '{}' has no valid '{}' value",
                row + 1,
                product_id,
                columns.period
            );
        };
        let quantity = quantity.unwrap_or(f64::NAN);

        let mut key = product_id.to_string();
        for (name, values) in columns.group_by.iter().zip(&group_values) {
            let Some(value) = values.get(row) else {
                anyhow::bail!(
                    "Row {} for product '{}' has no '{}' value",
                    row + 1,
                    product_id,
                    name
                );
            };
            key.push_str(KEY_SEPARATOR);
            key.push_str(value);
        }

        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                index.insert(key.clone(), records.len());
                records.push(DemandRecord::new(key, Vec::new()));
                records.len() - 1
            }
        };
        records[slot].points.push(DemandPoint { period, quantity });
    }

    for record in &mut records {
        record.points = merge_periods(std::mem::take(&mut record.points));
    }

    tracing::debug!(
        path = %file_path.display(),
        rows = df.height(),
        series = records.len(),
        group_by = ?columns.group_by,
        "loaded demand history"
    );

    Ok(records)
}

fn group_alias(i: usize) -> String {
    format!("group_{}", i)
}

/// Sort by period and sum duplicate periods, keeping invalid quantities visible
fn merge_periods(mut points: Vec<DemandPoint>) -> Vec<DemandPoint> {
    points.sort_by_key(|p| p.period);

    let mut merged: Vec<DemandPoint> = Vec::with_capacity(points.len());
    for point in points {
        match merged.last_mut() {
            Some(last) if last.period == point.period => {
                last.quantity = combine_quantities(last.quantity, point.quantity);
            }
            _ => merged.push(point),
        }
    }
    merged
}

fn combine_quantities(a: f64, b: f64) -> f64 {
    let invalid = |q: f64| !q.is_finite() || q < 0.0;
    if invalid(a) {
        a
    } else if invalid(b) {
        b
    } else {
        a + b
    }
}
