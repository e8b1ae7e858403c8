//! # Farm Load
//!
//! Feature pipeline for estimating a farm's electrical load from survey data.
//!
//! Three loosely related tables share a farm identifier: one property record per farm, many
//! farming-activity records and many well records. The pipeline normalizes their category
//! codes, one-hot expands them, aggregates activities and wells per farm and merges everything
//! with a visits table into a design matrix with one numeric row per visited farm.
//!
//! ```rust,no_run
//! use farm_load::processing::{build_design_matrix, GeoTables};
//! use farm_load::settings::PipelineSettings;
//! # async fn run(tables: GeoTables, visits: datafusion::prelude::DataFrame)
//! #     -> farm_load::exceptions::FarmLoadResult<()> {
//! let matrix = build_design_matrix(tables, visits, &PipelineSettings::default()).await?;
//! matrix.show().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Fitted state (category modes, outlier bounds, the model and its ordered feature names) is
//! written once and only read afterwards; see [`inference`] for prediction-time alignment.

pub mod exceptions;
pub mod inference;
pub mod io;
mod logging;
pub mod pipeline;
pub mod processing;
pub mod schema;
pub mod settings;
pub mod transformers;
