//! Builds the farm design matrix from exported survey layers.
//!
//! ```sh
//! farm-features --farms farms.csv --property property.csv --wells wells.csv \
//!     --visits visits.csv --output design_matrix.parquet --target load_kw
//! ```
//!
//! Pass `--capper capper.json` to fit the IQR capper from the settings on the matrix.
//!
//! Set `DEBUG_FARM_LOAD=1` to see per-stage logs.

use clap::Parser;
use datafusion::prelude::SessionContext;
use farm_load::exceptions::FarmLoadResult;
use farm_load::inference::feature_columns;
use farm_load::io::{load_geo_tables, load_table, write_table};
use farm_load::processing::{build_design_matrix, fit_capper};
use farm_load::schema::FARM_ID;
use farm_load::settings::PipelineSettings;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "farm-features",
    version,
    about = "Build the per-farm design matrix for electrical load estimation"
)]
struct Cli {
    /// Farms (activity) layer, CSV or Parquet.
    #[arg(long, value_name = "PATH")]
    farms: String,

    /// Property layer, CSV or Parquet.
    #[arg(long, value_name = "PATH")]
    property: String,

    /// Wells layer, CSV or Parquet.
    #[arg(long, value_name = "PATH")]
    wells: String,

    /// Visits table driving the output rows (must contain farm_id).
    #[arg(long, value_name = "PATH")]
    visits: String,

    /// Design matrix destination, CSV or Parquet.
    #[arg(long, value_name = "PATH")]
    output: String,

    /// JSON settings overriding the defaults.
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Target column of the visits table, excluded from the feature list.
    #[arg(long)]
    target: Option<String>,

    /// Write the ordered feature-name list (JSON) here.
    #[arg(long = "feature-names", value_name = "PATH")]
    feature_names: Option<PathBuf>,

    /// Fit the configured outlier capper on the matrix, write it (JSON) here and write the
    /// capped matrix.
    #[arg(long, value_name = "PATH")]
    capper: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> FarmLoadResult<()> {
    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => PipelineSettings::from_json_file(path)?,
        None => PipelineSettings::default(),
    };

    let ctx = SessionContext::new();
    let tables = load_geo_tables(&ctx, &cli.farms, &cli.property, &cli.wells).await?;
    let visits = load_table(&ctx, &cli.visits).await?;
    let matrix = build_design_matrix(tables, visits, &settings).await?;

    if let Some(path) = &cli.feature_names {
        let mut exclude = vec![FARM_ID];
        if let Some(target) = &cli.target {
            exclude.push(target.as_str());
        }
        let names = feature_columns(&matrix, &exclude);
        std::fs::write(path, serde_json::to_string_pretty(&names)?)?;
    }
    let matrix = match &cli.capper {
        Some(path) => {
            let capper = fit_capper(&matrix, &settings.capper).await?;
            std::fs::write(path, serde_json::to_string_pretty(&capper)?)?;
            capper.transform(matrix)?
        }
        None => matrix,
    };
    write_table(matrix, &cli.output).await
}
