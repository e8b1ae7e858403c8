#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::memory::MemTable;
use datafusion::prelude::*;

static TABLE_ID: AtomicUsize = AtomicUsize::new(0);

/// Creates an in-memory DataFrame from named columns (all nullable).
pub async fn create_df(columns: Vec<(&str, ArrayRef)>) -> DataFrame {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let arrays = columns.into_iter().map(|(_, array)| array).collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).unwrap();
    let mem_table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
    let ctx = SessionContext::new();
    let name = format!("t{}", TABLE_ID.fetch_add(1, Ordering::Relaxed));
    ctx.register_table(name.as_str(), Arc::new(mem_table)).unwrap();
    ctx.table(name.as_str()).await.unwrap()
}

pub fn floats(values: &[f64]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

pub fn opt_floats(values: &[Option<f64>]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

pub fn ints(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub fn strs(values: &[&str]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

pub fn opt_strs(values: &[Option<&str>]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

/// Executes the DataFrame and returns its rows as a single batch.
pub async fn collect_batch(df: DataFrame) -> RecordBatch {
    let schema = Arc::new(df.schema().as_arrow().clone());
    let batches = df.collect().await.unwrap();
    if batches.is_empty() {
        return RecordBatch::new_empty(schema);
    }
    concat_batches(&batches[0].schema(), &batches).unwrap()
}

pub fn names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

/// Values of a numeric column as f64 (nulls as None).
pub fn f64_column(batch: &RecordBatch, name: &str) -> Vec<Option<f64>> {
    let index = batch
        .schema()
        .index_of(name)
        .unwrap_or_else(|_| panic!("column {} not found in {:?}", name, names(batch)));
    let array = cast(batch.column(index), &DataType::Float64).unwrap();
    let array = array.as_any().downcast_ref::<Float64Array>().unwrap();
    (0..array.len())
        .map(|i| (!array.is_null(i)).then(|| array.value(i)))
        .collect()
}

/// Values of a numeric column as f64, panicking on nulls.
pub fn values(batch: &RecordBatch, name: &str) -> Vec<f64> {
    f64_column(batch, name)
        .into_iter()
        .map(|v| v.unwrap_or_else(|| panic!("unexpected null in {}", name)))
        .collect()
}

pub fn str_column(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
    let index = batch.schema().index_of(name).unwrap();
    let array = cast(batch.column(index), &DataType::Utf8).unwrap();
    let array = array.as_any().downcast_ref::<StringArray>().unwrap();
    (0..array.len())
        .map(|i| (!array.is_null(i)).then(|| array.value(i).to_string()))
        .collect()
}

/// Activity records of two farms; F1 carries the three activities of the worked example.
pub async fn activities_df() -> DataFrame {
    create_df(vec![
        ("activity_id", strs(&["A1", "A2", "A3", "A4", "A5"])),
        ("farm_id", strs(&["F1", "F1", "F1", "F2", "F2"])),
        ("activity_status", floats(&[1.0, 1.0, 3.0, 1.0, 0.0])),
        ("farm_type", floats(&[2.0, 2.0, 11.0, 0.0, 2.0])),
        ("main_crop_type", floats(&[1.0, 2.0, 2.0, 4.0, 4.0])),
        ("crop_type", floats(&[10.0, 11.0, 10.0, 40.0, 41.0])),
        ("irrigation_source", floats(&[1.0, 2.0, 1.0, 1.0, 1.0])),
        ("irrigation_type", floats(&[2.0, 3.0, 2.0, 3.0, 0.0])),
        ("farming_season", floats(&[3.0, 1.0, 3.0, 2.0, 2.0])),
        ("total_area_hectares", floats(&[2.0, 3.0, 0.0, 1.5, 0.5])),
        (
            "productive_trees_count",
            opt_floats(&[Some(120.0), Some(0.0), Some(0.0), Some(30.0), None]),
        ),
        ("protected_house_count", floats(&[0.0, 2.0, 0.0, 0.0, 0.0])),
        ("protected_house_type", floats(&[0.0, 1.0, 0.0, 0.0, 0.0])),
        ("plantations_count", floats(&[0.0, 0.0, 0.0, 5.0, 0.0])),
        ("plantations_type", floats(&[0.0, 0.0, 0.0, 2.0, 0.0])),
    ])
    .await
}

/// Three wells of F1 and one of F2.
pub async fn wells_df() -> DataFrame {
    create_df(vec![
        ("well_id", strs(&["W1", "W2", "W3", "W4"])),
        ("farm_id", strs(&["F1", "F1", "F1", "F2"])),
        ("well_possession_type", ints(&[1, 2, 1, 0])),
        ("well_is_active", ints(&[1, 2, 1, 1])),
        ("well_irrigation_source", floats(&[1.0, 1.0, 2.0, 4.0])),
        ("well_irrigation_type", floats(&[1.0, 3.0, 3.0, 3.0])),
    ])
    .await
}

/// Property records of F1..F3.
pub async fn property_df() -> DataFrame {
    create_df(vec![
        ("farm_id", strs(&["F1", "F2", "F3"])),
        ("area", floats(&[5200.0, 1800.0, 900.0])),
        ("main_type", ints(&[1, 3, 2])),
    ])
    .await
}

/// Visits of F1, F2 (no wells) and F4 (no upstream data at all).
pub async fn visits_df() -> DataFrame {
    create_df(vec![
        ("farm_id", strs(&["F4", "F1", "F2"])),
        ("load_kw", floats(&[7.0, 84.0, 12.5])),
    ])
    .await
}
