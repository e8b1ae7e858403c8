//! # One-hot expansion of category codes
//!
//! [`OneHotExpander`] replaces each categorical column with one 0/1 indicator column per code
//! observed at fit time. Indicators are named `{column}_{code}` and appended after the
//! remaining columns, grouped by source column in configuration order and by ascending code
//! within a column.
//!
//! The set of indicators depends on the data the expander was fitted on. A table that misses
//! some codes produces fewer indicators than the training table did, which is why inference
//! aligns its input against the persisted feature-name list instead of re-expanding.

use crate::exceptions::{FarmLoadError, FarmLoadResult};
use crate::impl_transformer;
use crate::schema::{category_label, column, column_type, validate_columns};
use arrow::array::{Array, Float64Array};
use arrow::datatypes::DataType;
use datafusion::common::Column;
use datafusion::prelude::*;
use datafusion_expr::{cast, lit, Case as DFCase, Expr};
use datafusion_functions::math::expr_fn::isnan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Codes observed for one categorical column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySet {
    /// Whether the source column is a float column (affects indicator naming).
    pub floating: bool,
    /// Distinct non-null codes in ascending order.
    pub codes: Vec<f64>,
}

impl CategorySet {
    /// Indicator column names for `source`, in code order.
    pub fn indicator_names(&self, source: &str) -> Vec<String> {
        self.codes
            .iter()
            .map(|&code| format!("{}_{}", source, category_label(code, self.floating)))
            .collect()
    }
}

/// Extract the distinct codes of a column in ascending order.
async fn extract_distinct_codes(df: &DataFrame, col_name: &str) -> FarmLoadResult<Vec<f64>> {
    let code = column("code");
    let distinct_df = df
        .clone()
        .select(vec![cast(column(col_name), DataType::Float64).alias("code")])?
        .filter(code.clone().is_not_null().and(not(isnan(code.clone()))))?
        .distinct()?
        .sort(vec![code.sort(true, false)])?;
    let batches = distinct_df.collect().await?;
    let mut values = Vec::new();
    for batch in batches {
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                FarmLoadError::InvalidParameter(format!(
                    "Expected Float64 codes for column {}",
                    col_name
                ))
            })?;
        values.extend(array.iter().flatten());
    }
    Ok(values)
}

/// Expands categorical code columns into 0/1 indicator columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OneHotExpander {
    pub columns: Vec<String>,
    /// Mapping from column name to the codes observed at fit time.
    pub categories: BTreeMap<String, CategorySet>,
}

impl OneHotExpander {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            categories: BTreeMap::new(),
        }
    }

    /// Learn the distinct codes of each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> FarmLoadResult<()> {
        validate_columns(df, &self.columns)?;
        let mut categories = BTreeMap::new();
        for col_name in &self.columns {
            let floating = column_type(df, col_name)?.is_floating();
            let codes = extract_distinct_codes(df, col_name).await?;
            debug!(column = %col_name, ?codes, "observed categories");
            categories.insert(col_name.clone(), CategorySet { floating, codes });
        }
        self.categories = categories;
        Ok(())
    }

    /// Indicator column names this expander produces, in output order.
    pub fn indicator_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter_map(|c| self.categories.get(c).map(|set| set.indicator_names(c)))
            .flatten()
            .collect()
    }

    /// Drop the target columns and append their Int64 indicator columns.
    pub fn transform(&self, df: DataFrame) -> FarmLoadResult<DataFrame> {
        if !self.inherent_is_fitted() {
            return Err(FarmLoadError::NotFitted("OneHotExpander".to_string()));
        }
        validate_columns(&df, &self.columns)?;
        let mut exprs: Vec<Expr> = df
            .schema()
            .iter()
            .filter(|(_, field)| !self.columns.contains(field.name()))
            .map(|(qualifier, field)| Expr::Column(Column::new(qualifier.cloned(), field.name())))
            .collect();
        for col_name in &self.columns {
            let Some(set) = self.categories.get(col_name) else {
                continue;
            };
            for (code, name) in set.codes.iter().zip(set.indicator_names(col_name)) {
                let indicator = Expr::Case(DFCase {
                    expr: None,
                    when_then_expr: vec![(
                        Box::new(cast(column(col_name), DataType::Float64).eq(lit(*code))),
                        Box::new(lit(1_i64)),
                    )],
                    else_expr: Some(Box::new(lit(0_i64))),
                });
                exprs.push(indicator.alias(name));
            }
        }
        Ok(df.select(exprs)?)
    }

    pub fn inherent_is_stateful(&self) -> bool {
        true
    }

    pub fn inherent_is_fitted(&self) -> bool {
        self.columns.iter().all(|c| self.categories.contains_key(c))
    }
}

impl_transformer!(OneHotExpander);

/// Expands `columns` of `df` into indicators for the codes observed in `df` itself.
pub async fn expand(df: DataFrame, columns: &[String]) -> FarmLoadResult<DataFrame> {
    let mut expander = OneHotExpander::new(columns.to_vec());
    expander.fit(&df).await?;
    expander.transform(df)
}
