//! Robust feature scaling (median / interquartile range)
//!
//! [`RobustScaler`] carries the configuration and, once fit, an immutable
//! [`FittedScaler`] snapshot. The snapshot can be used on its own (and is
//! what gets persisted); the wrapper reports [`AnomalyError::UnfittedState`]
//! when asked to transform before it was fit.

use crate::error::{AnomalyError, Result};
use crate::utils::stats::quantile_sorted;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Center and spread of one feature column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub median: f64,
    /// Upper minus lower quantile; may be zero for constant columns
    pub interquartile_range: f64,
}

impl ColumnStats {
    /// Divisor applied in transform: the IQR, or 1.0 when it is zero or
    /// not finite
    pub fn scale(&self) -> f64 {
        if self.interquartile_range == 0.0 || !self.interquartile_range.is_finite() {
            1.0
        } else {
            self.interquartile_range
        }
    }
}

/// Per-column statistics fitted on a training matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    columns: Vec<ColumnStats>,
}

impl FittedScaler {
    /// Statistics in column order
    pub fn columns(&self) -> &[ColumnStats] {
        &self.columns
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// `(value - median) / scale`, elementwise
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.columns.len() {
            return Err(AnomalyError::columns(self.columns.len(), x.ncols()));
        }

        let mut scaled = x.clone();
        for (mut column, stats) in scaled.axis_iter_mut(Axis(1)).zip(&self.columns) {
            let scale = stats.scale();
            column.mapv_inplace(|v| (v - stats.median) / scale);
        }
        Ok(scaled)
    }

    /// Undo [`FittedScaler::transform`]
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.columns.len() {
            return Err(AnomalyError::columns(self.columns.len(), x.ncols()));
        }

        let mut unscaled = x.clone();
        for (mut column, stats) in unscaled.axis_iter_mut(Axis(1)).zip(&self.columns) {
            let scale = stats.scale();
            column.mapv_inplace(|v| v * scale + stats.median);
        }
        Ok(unscaled)
    }
}

/// Robust scaler with configurable quantile range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    /// Lower and upper quantile in percent
    quantile_range: (f64, f64),
    fitted: Option<FittedScaler>,
}

impl Default for RobustScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl RobustScaler {
    /// Create a scaler using the 25th-75th percentile range
    pub fn new() -> Self {
        Self {
            quantile_range: (25.0, 75.0),
            fitted: None,
        }
    }

    /// Set the quantile range in percent, e.g. `(10.0, 90.0)`
    pub fn with_quantile_range(mut self, lower: f64, upper: f64) -> Result<Self> {
        if !(0.0..upper).contains(&lower) || upper > 100.0 {
            return Err(AnomalyError::InvalidParameter {
                name: "quantile_range".to_string(),
                value: format!("({}, {})", lower, upper),
                reason: "expected 0 <= lower < upper <= 100".to_string(),
            });
        }
        self.quantile_range = (lower, upper);
        Ok(self)
    }

    /// Fit per-column median and quantile range on the rows of `x`
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&FittedScaler> {
        if x.nrows() == 0 {
            return Err(AnomalyError::EmptyDataset(
                "cannot fit scaler on a matrix with zero rows".to_string(),
            ));
        }

        let (lower, upper) = (self.quantile_range.0 / 100.0, self.quantile_range.1 / 100.0);
        let columns: Vec<ColumnStats> = (0..x.ncols())
            .into_par_iter()
            .map(|j| {
                let mut values: Vec<f64> = x.column(j).to_vec();
                values.sort_by(f64::total_cmp);
                let q = |p: f64| quantile_sorted(&values, p).unwrap_or(0.0);
                ColumnStats {
                    median: q(0.5),
                    interquartile_range: q(upper) - q(lower),
                }
            })
            .collect();

        debug!(rows = x.nrows(), columns = columns.len(), "Fitted robust scaler");
        Ok(self.fitted.insert(FittedScaler { columns }))
    }

    /// Transform with the fitted statistics
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fitted()?.transform(x)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?.transform(x)
    }

    /// The fitted snapshot, or `UnfittedState`
    pub fn fitted(&self) -> Result<&FittedScaler> {
        self.fitted
            .as_ref()
            .ok_or_else(|| AnomalyError::UnfittedState("RobustScaler.transform called before fit".to_string()))
    }

    /// Consume the scaler and return its snapshot
    pub fn into_fitted(self) -> Result<FittedScaler> {
        self.fitted
            .ok_or_else(|| AnomalyError::UnfittedState("RobustScaler has not been fit".to_string()))
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}
