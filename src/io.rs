//! ## Table I/O
//!
//! Reads survey layers exported as CSV or Parquet and writes the design matrix back out.
//! Geo-specific formats are converted upstream; here a layer is just a table whose columns
//! use the raw survey names listed in [`crate::schema`].

use crate::exceptions::{FarmLoadError, FarmLoadResult};
pub use crate::processing::GeoTables;
use crate::schema::{rename_columns, RAW_ACTIVITY_COLUMNS, RAW_PROPERTY_COLUMNS, RAW_WELL_COLUMNS};
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::*;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableFormat {
    Csv,
    Parquet,
}

fn detect_format(path: &str) -> FarmLoadResult<TableFormat> {
    match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some("csv") => Ok(TableFormat::Csv),
        Some("parquet") => Ok(TableFormat::Parquet),
        _ => Err(FarmLoadError::InvalidParameter(format!(
            "Unsupported file format for '{}'. Please provide a CSV or Parquet file.",
            path
        ))),
    }
}

/// Loads a table from a given path, detecting the format (CSV or Parquet) from its extension.
pub async fn load_table(ctx: &SessionContext, path: &str) -> FarmLoadResult<DataFrame> {
    let df = match detect_format(path)? {
        TableFormat::Csv => ctx.read_csv(path, CsvReadOptions::new()).await?,
        TableFormat::Parquet => ctx.read_parquet(path, ParquetReadOptions::default()).await?,
    };
    info!(path, "loaded table");
    Ok(df)
}

/// Loads the three raw survey layers and renames their columns to the canonical schema.
pub async fn load_geo_tables(
    ctx: &SessionContext,
    activities_path: &str,
    property_path: &str,
    wells_path: &str,
) -> FarmLoadResult<GeoTables> {
    let activities = rename_columns(load_table(ctx, activities_path).await?, &RAW_ACTIVITY_COLUMNS)?;
    let property = rename_columns(load_table(ctx, property_path).await?, &RAW_PROPERTY_COLUMNS)?;
    let wells = rename_columns(load_table(ctx, wells_path).await?, &RAW_WELL_COLUMNS)?;
    Ok(GeoTables {
        activities,
        property,
        wells,
    })
}

/// Writes a table to `path` as CSV or Parquet, chosen by extension.
pub async fn write_table(df: DataFrame, path: &str) -> FarmLoadResult<()> {
    let options = DataFrameWriteOptions::new().with_single_file_output(true);
    match detect_format(path)? {
        TableFormat::Csv => {
            df.write_csv(path, options, None).await?;
        }
        TableFormat::Parquet => {
            df.write_parquet(path, options, None).await?;
        }
    }
    info!(path, "wrote table");
    Ok(())
}
