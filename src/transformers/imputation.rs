//! ## Categorical normalization
//!
//! Survey tables mark an unspecified category with the sentinel code `0` (or leave it null).
//! [`CategoricalNormalizer`] replaces null, NaN and `0` in each configured column with the
//! column's mode, the most frequent valid code. Ties are broken by taking the lowest code, so
//! repeated runs over the same table always impute the same value.
//!
//! The learned modes are plain data and serialize with the rest of a fitted pipeline, so a
//! later batch can be imputed exactly as the training batch was.

use crate::exceptions::{FarmLoadError, FarmLoadResult};
use crate::impl_transformer;
use crate::schema::{column, column_type, validate_columns};
use arrow::array::{Array, Float64Array};
use arrow::datatypes::DataType;
use datafusion::common::Column;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::prelude::*;
use datafusion_expr::{cast, lit, Case as DFCase, Expr};
use datafusion_functions::math::expr_fn::isnan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// The sentinel code meaning "unspecified".
pub const SENTINEL_CODE: f64 = 0.0;

/// True when `code` (a Float64 expression) holds a usable category code.
fn is_valid_code(code: Expr) -> Expr {
    code.clone()
        .is_not_null()
        .and(not(isnan(code.clone())))
        .and(code.not_eq(lit(SENTINEL_CODE)))
}

/// Computes the most frequent valid code of a column, lowest code first among ties.
async fn compute_mode(df: &DataFrame, col_name: &str) -> FarmLoadResult<f64> {
    let grouped = df
        .clone()
        .select(vec![cast(column(col_name), DataType::Float64).alias("code")])?
        .filter(is_valid_code(column("code")))?
        .aggregate(vec![column("code")], vec![count(lit(1)).alias("cnt")])?
        .sort(vec![
            column("cnt").sort(false, false),
            column("code").sort(true, false),
        ])?
        .limit(0, Some(1))?;
    let batches = grouped.collect().await?;
    for batch in batches {
        if batch.num_rows() == 0 {
            continue;
        }
        let codes = batch
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                FarmLoadError::InvalidParameter(format!(
                    "Expected Float64 codes for column {}",
                    col_name
                ))
            })?;
        if !codes.is_null(0) {
            return Ok(codes.value(0));
        }
    }
    Err(FarmLoadError::InsufficientData(col_name.to_string()))
}

/// Replaces missing and sentinel category codes with the per-column mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalNormalizer {
    pub columns: Vec<String>,
    /// Learned mode per column.
    pub modes: BTreeMap<String, f64>,
}

impl CategoricalNormalizer {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            modes: BTreeMap::new(),
        }
    }

    /// Computes the mode of every target column.
    ///
    /// Fails with `InsufficientData` when a column holds no valid code at all.
    pub async fn fit(&mut self, df: &DataFrame) -> FarmLoadResult<()> {
        validate_columns(df, &self.columns)?;
        let mut modes = BTreeMap::new();
        for col_name in &self.columns {
            let mode = compute_mode(df, col_name).await?;
            debug!(column = %col_name, mode, "computed categorical mode");
            modes.insert(col_name.clone(), mode);
        }
        self.modes = modes;
        Ok(())
    }

    /// Returns a new DataFrame where missing and sentinel codes of the target columns are
    /// replaced by the learned modes. Column types are preserved.
    pub fn transform(&self, df: DataFrame) -> FarmLoadResult<DataFrame> {
        if !self.inherent_is_fitted() {
            return Err(FarmLoadError::NotFitted("CategoricalNormalizer".to_string()));
        }
        validate_columns(&df, &self.columns)?;
        let mut exprs = Vec::with_capacity(df.schema().fields().len());
        for (qualifier, field) in df.schema().iter() {
            let name = field.name();
            let original = Expr::Column(Column::new(qualifier.cloned(), name));
            match self.modes.get(name) {
                Some(&mode) if self.columns.contains(name) => {
                    let data_type = column_type(&df, name)?;
                    let code = cast(original.clone(), DataType::Float64);
                    let missing = code
                        .clone()
                        .is_null()
                        .or(isnan(code.clone()))
                        .or(code.eq(lit(SENTINEL_CODE)));
                    let replaced = Expr::Case(DFCase {
                        expr: None,
                        when_then_expr: vec![(
                            Box::new(missing),
                            Box::new(cast(lit(mode), data_type)),
                        )],
                        else_expr: Some(Box::new(original)),
                    });
                    exprs.push(replaced.alias(name));
                }
                _ => exprs.push(original),
            }
        }
        Ok(df.select(exprs)?)
    }

    pub fn inherent_is_stateful(&self) -> bool {
        true
    }

    pub fn inherent_is_fitted(&self) -> bool {
        self.columns.iter().all(|c| self.modes.contains_key(c))
    }
}

impl_transformer!(CategoricalNormalizer);

/// Normalizes `columns` of `df` using modes computed over `df` itself.
pub async fn normalize(df: DataFrame, columns: &[String]) -> FarmLoadResult<DataFrame> {
    let mut normalizer = CategoricalNormalizer::new(columns.to_vec());
    normalizer.fit(&df).await?;
    normalizer.transform(df)
}
