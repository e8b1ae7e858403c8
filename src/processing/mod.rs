//! # Per-farm processing stages
//!
//! Turns the three survey tables into one design-matrix row per visited farm:
//!
//! ```text
//! activities -> normalize -> expand -> aggregate_activities --+
//! wells      -> normalize -> expand -> aggregate_wells -------+--> integrate(+ visits)
//! property   -> extract_property -----------------------------+
//! ```
//!
//! Every stage returns a new DataFrame; input tables are never modified.

pub mod activities;
pub mod integration;
pub mod property;
pub mod wells;

use crate::exceptions::FarmLoadResult;
use crate::settings::{CapperSettings, PipelineSettings};
use crate::transformers::outlier_handling::OutlierCapper;
use datafusion::prelude::*;
use datafusion_expr::{lit, Case as DFCase, Expr};
use futures::try_join;
use tracing::info;

pub use activities::{aggregate_activities, process_activities};
pub use integration::integrate;
pub use property::extract_property;
pub use wells::{aggregate_wells, process_wells};

/// The three survey tables of one pipeline run, already in canonical column names.
pub struct GeoTables {
    pub activities: DataFrame,
    pub property: DataFrame,
    pub wells: DataFrame,
}

/// `expr`, or zero where `expr` is null.
pub(crate) fn zero_if_null(expr: Expr) -> Expr {
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![(Box::new(expr.clone().is_null()), Box::new(lit(0_i64)))],
        else_expr: Some(Box::new(expr)),
    })
}

/// Runs every stage (the three per-table stages concurrently) and returns the design matrix, one row per farm in `visits`.
pub async fn build_design_matrix(
    tables: GeoTables,
    visits: DataFrame,
    settings: &PipelineSettings,
) -> FarmLoadResult<DataFrame> {
    let (activities, wells, property) = try_join!(
        process_activities(tables.activities, &settings.activities),
        process_wells(tables.wells, &settings.wells),
        extract_property(tables.property, &settings.property)
    )?;
    let matrix = integrate(property, activities, wells, visits, &settings.merge).await?;
    info!(
        columns = matrix.schema().fields().len(),
        "design matrix assembled"
    );
    Ok(matrix)
}

/// Fits the configured outlier capper on a design matrix.
///
/// Every configured column must be present; the capper is then reused unchanged for later
/// batches and for inference.
pub async fn fit_capper(
    matrix: &DataFrame,
    settings: &CapperSettings,
) -> FarmLoadResult<OutlierCapper> {
    let mut capper = OutlierCapper::from(settings);
    capper.fit(matrix).await?;
    info!(columns = capper.bounds.len(), factor = capper.factor, "outlier capper fitted");
    Ok(capper)
}
