//! ## Inference
//!
//! A fitted model is trained on the design matrix columns that existed at training time. A
//! prediction-time input, typically one farm collected through a form, carries only the
//! indicator columns of its own categories. This module aligns such input with the persisted
//! feature-name list before prediction:
//!
//! - every expected feature missing from the input becomes a zero column,
//! - columns are selected in exactly the expected order,
//! - input columns the model does not know are dropped.
//!
//! [`ModelArtifact`] is the persisted bundle of ordered feature names, fitted outlier capper and
//! regressor, stored as JSON.

use crate::exceptions::{FarmLoadError, FarmLoadResult};
use crate::make_pipeline;
use crate::pipeline::Pipeline;
use crate::schema::{column, column_names, has_column};
use crate::transformers::outlier_handling::OutlierCapper;
use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::{cast as cast_array, concat_batches};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::*;
use datafusion_expr::{cast, lit, Expr};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A fitted estimator mapping aligned feature rows to predictions.
pub trait Regressor: Send + Sync {
    /// Predicts one value per row of `features`; columns are in feature-name order.
    fn predict(&self, features: &RecordBatch) -> FarmLoadResult<Vec<f64>>;
}

/// Linear model `intercept + sum(coefficient_i * feature_i)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegressor {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }
}

impl Regressor for LinearRegressor {
    fn predict(&self, features: &RecordBatch) -> FarmLoadResult<Vec<f64>> {
        if features.num_columns() != self.coefficients.len() {
            return Err(FarmLoadError::SchemaMismatch(format!(
                "model expects {} features, got {}",
                self.coefficients.len(),
                features.num_columns()
            )));
        }
        let columns = features
            .columns()
            .iter()
            .map(|array| cast_array(array, &DataType::Float64))
            .collect::<Result<Vec<ArrayRef>, _>>()?;
        let mut predictions = vec![self.intercept; features.num_rows()];
        for (array, coefficient) in columns.iter().zip(&self.coefficients) {
            let values = array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    FarmLoadError::SchemaMismatch("feature is not numeric".to_string())
                })?;
            for (row, prediction) in predictions.iter_mut().enumerate() {
                if !values.is_null(row) {
                    *prediction += coefficient * values.value(row);
                }
            }
        }
        Ok(predictions)
    }
}

/// Preprocessing fitted at training time followed by a regressor.
pub struct FittedPipeline {
    preprocessing: Option<Pipeline>,
    regressor: Box<dyn Regressor>,
}

impl FittedPipeline {
    pub fn new(preprocessing: Option<Pipeline>, regressor: Box<dyn Regressor>) -> Self {
        Self {
            preprocessing,
            regressor,
        }
    }

    /// Applies the preprocessing steps (never re-fitting them) and predicts every row.
    pub async fn predict(&self, df: DataFrame) -> FarmLoadResult<Vec<f64>> {
        let df = match &self.preprocessing {
            Some(pipeline) => pipeline.transform(df)?,
            None => df,
        };
        let batches = df.collect().await?;
        let Some(first) = batches.first() else {
            return Ok(Vec::new());
        };
        let batch = concat_batches(&first.schema(), &batches)?;
        self.regressor.predict(&batch)
    }
}

fn check_feature_names(expected: &[String]) -> FarmLoadResult<()> {
    if expected.is_empty() {
        return Err(FarmLoadError::SchemaMismatch(
            "expected feature-name list is empty".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(expected.len());
    for name in expected {
        if !seen.insert(name.as_str()) {
            return Err(FarmLoadError::SchemaMismatch(format!(
                "feature '{}' is listed more than once",
                name
            )));
        }
    }
    Ok(())
}

/// Ordered feature names of a training design matrix: every column except `exclude`
/// (typically the key and the target).
pub fn feature_columns(df: &DataFrame, exclude: &[&str]) -> Vec<String> {
    column_names(df)
        .into_iter()
        .filter(|name| !exclude.contains(&name.as_str()))
        .collect()
}

/// Builds a one-row Float64 batch with exactly the `expected` columns, in order.
/// Features absent from `row` are zero.
pub fn align_row(expected: &[String], row: &HashMap<String, f64>) -> FarmLoadResult<RecordBatch> {
    check_feature_names(expected)?;
    let unknown: Vec<&String> = row
        .keys()
        .filter(|name| !expected.contains(*name))
        .collect();
    if !unknown.is_empty() {
        warn!(?unknown, "dropping input fields the model was not trained on");
    }
    let fields: Vec<Field> = expected
        .iter()
        .map(|name| Field::new(name, DataType::Float64, false))
        .collect();
    let arrays: Vec<ArrayRef> = expected
        .iter()
        .map(|name| {
            let value = row.get(name).copied().unwrap_or(0.0);
            Arc::new(Float64Array::from(vec![value])) as ArrayRef
        })
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Selects the `expected` columns of `df` in order as Float64, adding zero columns for missing
/// ones and dropping the rest.
pub fn align_frame(df: DataFrame, expected: &[String]) -> FarmLoadResult<DataFrame> {
    check_feature_names(expected)?;
    let exprs: Vec<Expr> = expected
        .iter()
        .map(|name| {
            if has_column(&df, name) {
                cast(column(name), DataType::Float64).alias(name)
            } else {
                debug!(feature = %name, "zero-filling missing feature");
                lit(0.0_f64).alias(name)
            }
        })
        .collect();
    Ok(df.select(exprs)?)
}

/// Aligns a single form-style record with `expected` and predicts it.
pub async fn align_and_predict(
    pipeline: &FittedPipeline,
    expected: &[String],
    row: &HashMap<String, f64>,
) -> FarmLoadResult<f64> {
    let batch = align_row(expected, row)?;
    let ctx = SessionContext::new();
    let df = ctx.read_batch(batch)?;
    let predictions = pipeline.predict(df).await?;
    predictions
        .first()
        .copied()
        .ok_or_else(|| FarmLoadError::SchemaMismatch("model returned no prediction".to_string()))
}

/// Persisted fitted-model bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Ordered feature names the model was trained on.
    pub feature_names: Vec<String>,
    pub capper: Option<OutlierCapper>,
    pub model: LinearRegressor,
}

impl ModelArtifact {
    /// Checks that the parts of the bundle agree with the feature list.
    pub fn validate(&self) -> FarmLoadResult<()> {
        check_feature_names(&self.feature_names)?;
        if self.model.coefficients.len() != self.feature_names.len() {
            return Err(FarmLoadError::SchemaMismatch(format!(
                "{} coefficients for {} features",
                self.model.coefficients.len(),
                self.feature_names.len()
            )));
        }
        if let Some(capper) = &self.capper {
            if !capper.inherent_is_fitted() {
                return Err(FarmLoadError::NotFitted("OutlierCapper".to_string()));
            }
            if let Some(stray) = capper
                .columns
                .iter()
                .find(|c| !self.feature_names.contains(c))
            {
                return Err(FarmLoadError::SchemaMismatch(format!(
                    "capped column '{}' is not a model feature",
                    stray
                )));
            }
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> FarmLoadResult<()> {
        self.validate()?;
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> FarmLoadResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let artifact: Self = serde_json::from_reader(reader)?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Rebuilds the fitted pipeline; returns it with the ordered feature names.
    pub fn into_pipeline(self) -> FarmLoadResult<(FittedPipeline, Vec<String>)> {
        self.validate()?;
        let preprocessing = self
            .capper
            .map(|capper| make_pipeline!(false, ("outlier_capper", capper)));
        let pipeline = FittedPipeline::new(preprocessing, Box::new(self.model));
        Ok((pipeline, self.feature_names))
    }
}
