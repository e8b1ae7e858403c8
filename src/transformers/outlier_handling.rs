//! ## IQR outlier capping
//!
//! [`OutlierCapper`] clips each configured column to `[Q1 - k*IQR, Q3 + k*IQR]`, where the
//! quartiles come from the table the capper was fitted on. Quartiles use linear
//! interpolation between order statistics and ignore nulls and NaNs; nulls and NaNs are also
//! left as they are by `transform`.
//!
//! Bounds are learned once. Later tables, including single inference rows, are clipped with the
//! same bounds and never re-fitted. Clipping is idempotent, so transforming twice is the same
//! as transforming once.

use crate::exceptions::{FarmLoadError, FarmLoadResult};
use crate::impl_transformer;
use crate::schema::{column, validate_columns};
use crate::settings::CapperSettings;
use arrow::array::{Array, Float64Array};
use arrow::compute::cast as cast_array;
use arrow::datatypes::DataType;
use datafusion::common::Column;
use datafusion::prelude::*;
use datafusion_expr::{cast, lit, Case as DFCase, Expr};
use datafusion_functions::math::expr_fn::isnan;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Lower and upper clipping bound of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapBounds {
    pub lower: f64,
    pub upper: f64,
}

/// Quantile of sorted values with linear interpolation between neighbours.
pub(crate) fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = (sorted.len() - 1) as f64 * q;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    let fraction = position - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * fraction)
}

/// IQR bounds of a sample; `None` when the sample is empty.
pub(crate) fn iqr_bounds(mut values: Vec<f64>, factor: f64) -> Option<CapBounds> {
    values.sort_by(|a, b| a.total_cmp(b));
    let q1 = quantile(&values, 0.25)?;
    let q3 = quantile(&values, 0.75)?;
    let iqr = q3 - q1;
    Some(CapBounds {
        lower: q1 - factor * iqr,
        upper: q3 + factor * iqr,
    })
}

/// CASE expression clipping `expr` (as Float64) into `[lower, upper]`. NaN passes through,
/// since Arrow orders it above every number.
fn cap_expr_for(expr: Expr, bounds: CapBounds) -> Expr {
    let base = cast(expr, DataType::Float64);
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![
            (Box::new(isnan(base.clone())), Box::new(base.clone())),
            (
                Box::new(base.clone().lt(lit(bounds.lower))),
                Box::new(lit(bounds.lower)),
            ),
            (
                Box::new(base.clone().gt(lit(bounds.upper))),
                Box::new(lit(bounds.upper)),
            ),
        ],
        else_expr: Some(Box::new(base)),
    })
}

/// Collects the non-null, non-NaN values of a column as f64.
async fn collect_values(df: &DataFrame, col_name: &str) -> FarmLoadResult<Vec<f64>> {
    let batches = df
        .clone()
        .select(vec![column(col_name)])?
        .collect()
        .await?;
    let mut values = Vec::new();
    for batch in batches {
        let as_float = cast_array(batch.column(0), &DataType::Float64)?;
        let array = as_float
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                FarmLoadError::InvalidParameter(format!(
                    "Column {} cannot be read as Float64",
                    col_name
                ))
            })?;
        values.extend(array.iter().flatten().filter(|v| !v.is_nan()));
    }
    Ok(values)
}

/// Caps outliers with bounds derived from the interquartile range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierCapper {
    pub columns: Vec<String>,
    pub factor: f64,
    /// Bounds per column, written by `fit`.
    pub bounds: BTreeMap<String, CapBounds>,
}

impl OutlierCapper {
    pub fn new(columns: Vec<String>, factor: f64) -> Self {
        Self {
            columns,
            factor,
            bounds: BTreeMap::new(),
        }
    }

    /// Computes the capping bounds of every configured column.
    pub async fn fit(&mut self, df: &DataFrame) -> FarmLoadResult<()> {
        if !self.factor.is_finite() || self.factor < 0.0 {
            return Err(FarmLoadError::InvalidParameter(format!(
                "IQR factor {} must be a finite, non-negative number",
                self.factor
            )));
        }
        validate_columns(df, &self.columns)?;
        let mut samples = Vec::with_capacity(self.columns.len());
        for col_name in &self.columns {
            samples.push((col_name.clone(), collect_values(df, col_name).await?));
        }
        let factor = self.factor;
        let computed: Vec<(String, Option<CapBounds>)> = samples
            .into_par_iter()
            .map(|(name, values)| (name, iqr_bounds(values, factor)))
            .collect();
        let mut bounds = BTreeMap::new();
        for (name, cap) in computed {
            let cap = cap.ok_or_else(|| FarmLoadError::InsufficientData(name.clone()))?;
            debug!(column = %name, lower = cap.lower, upper = cap.upper, "fitted capping bounds");
            bounds.insert(name, cap);
        }
        self.bounds = bounds;
        Ok(())
    }

    /// Returns a new DataFrame where each configured column is clipped to its fitted bounds.
    /// Capped columns become Float64; other columns are untouched.
    pub fn transform(&self, df: DataFrame) -> FarmLoadResult<DataFrame> {
        if !self.inherent_is_fitted() {
            return Err(FarmLoadError::NotFitted("OutlierCapper".to_string()));
        }
        validate_columns(&df, &self.columns)?;
        let exprs: Vec<Expr> = df
            .schema()
            .iter()
            .map(|(qualifier, field)| {
                let name = field.name();
                let original = Expr::Column(Column::new(qualifier.cloned(), name));
                match self.bounds.get(name) {
                    Some(&cap) if self.columns.contains(name) => {
                        cap_expr_for(original, cap).alias(name)
                    }
                    _ => original,
                }
            })
            .collect();
        Ok(df.select(exprs)?)
    }

    pub fn inherent_is_stateful(&self) -> bool {
        true
    }

    pub fn inherent_is_fitted(&self) -> bool {
        self.columns.iter().all(|c| self.bounds.contains_key(c))
    }
}

impl_transformer!(OutlierCapper);

impl From<&CapperSettings> for OutlierCapper {
    fn from(settings: &CapperSettings) -> Self {
        Self::new(settings.columns.clone(), settings.factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&values, 0.25).unwrap(), 1.75);
        assert_relative_eq!(quantile(&values, 0.5).unwrap(), 2.5);
        assert_relative_eq!(quantile(&values, 0.75).unwrap(), 3.25);
        assert!(quantile(&[], 0.5).is_none());
    }

    #[test]
    fn test_iqr_bounds() {
        let bounds = iqr_bounds(vec![4.0, 1.0, 3.0, 2.0], 1.5).unwrap();
        // Q1 = 1.75, Q3 = 3.25, IQR = 1.5
        assert_relative_eq!(bounds.lower, -0.5);
        assert_relative_eq!(bounds.upper, 5.5);
    }

    #[test]
    fn test_single_value_gives_degenerate_bounds() {
        let bounds = iqr_bounds(vec![7.0], 1.5).unwrap();
        assert_eq!(bounds.lower, 7.0);
        assert_eq!(bounds.upper, 7.0);
    }
}
