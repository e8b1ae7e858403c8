// Run `cargo run --example basic_usage` to execute this example

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::{DataFrame, SessionContext};
use farm_load::processing::{build_design_matrix, GeoTables};
use farm_load::settings::PipelineSettings;
use std::error::Error;
use std::sync::Arc;

fn table(ctx: &SessionContext, columns: Vec<(&str, ArrayRef)>) -> Result<DataFrame, Box<dyn Error>> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    Ok(ctx.read_batch(batch)?)
}

fn floats(values: &[f64]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

fn ints(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

fn ids(values: &[&str]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let ctx = SessionContext::new();

    let activities = table(
        &ctx,
        vec![
            ("activity_id", ids(&["A1", "A2", "A3", "A4"])),
            ("farm_id", ids(&["F1", "F1", "F1", "F2"])),
            ("activity_status", floats(&[1.0, 1.0, 0.0, 3.0])),
            ("farm_type", floats(&[2.0, 2.0, 11.0, 0.0])),
            ("main_crop_type", floats(&[1.0, 2.0, 2.0, 4.0])),
            ("crop_type", floats(&[10.0, 11.0, 10.0, 40.0])),
            ("irrigation_source", floats(&[1.0, 2.0, 1.0, 0.0])),
            ("irrigation_type", floats(&[2.0, 3.0, 2.0, 3.0])),
            ("farming_season", floats(&[3.0, 1.0, 3.0, 2.0])),
            ("total_area_hectares", floats(&[2.0, 3.0, 0.0, 1.5])),
            ("productive_trees_count", floats(&[120.0, 0.0, 0.0, 30.0])),
            ("protected_house_count", floats(&[0.0, 2.0, 0.0, 0.0])),
            ("protected_house_type", floats(&[0.0, 1.0, 0.0, 0.0])),
            ("plantations_count", floats(&[0.0, 0.0, 0.0, 5.0])),
            ("plantations_type", floats(&[0.0, 0.0, 0.0, 2.0])),
        ],
    )?;
    let wells = table(
        &ctx,
        vec![
            ("well_id", ids(&["W1", "W2", "W3"])),
            ("farm_id", ids(&["F1", "F1", "F3"])),
            ("well_possession_type", ints(&[1, 2, 1])),
            ("well_is_active", ints(&[1, 1, 0])),
            ("well_irrigation_source", floats(&[1.0, 2.0, 1.0])),
            ("well_irrigation_type", floats(&[1.0, 1.0, 3.0])),
        ],
    )?;
    let property = table(
        &ctx,
        vec![
            ("farm_id", ids(&["F1", "F2", "F3"])),
            ("area", floats(&[5200.0, 1800.0, 900.0])),
            ("main_type", ints(&[1, 3, 2])),
        ],
    )?;
    let visits = table(
        &ctx,
        vec![
            ("farm_id", ids(&["F1", "F2", "F3", "F4"])),
            ("load_kw", floats(&[84.0, 12.5, 30.0, 7.0])),
        ],
    )?;

    let tables = GeoTables {
        activities,
        property,
        wells,
    };
    let matrix = build_design_matrix(tables, visits, &PipelineSettings::default()).await?;
    matrix.show().await?;

    Ok(())
}
