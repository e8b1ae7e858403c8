//! ## Canonical Schema
//!
//! Canonical column names of the three survey tables, the rename maps from the raw geo layer
//! names, and small helpers shared by every stage for referencing and checking columns.
//!
//! Indicator column names carry category codes such as `irrigation_type_2.0`. DataFusion's
//! `col("a.b")` parses the dot as a `table.column` separator, so all references made here go
//! through [`column`], which builds an identifier without parsing.

use crate::exceptions::{FarmLoadError, FarmLoadResult};
use arrow::datatypes::DataType;
use datafusion::common::Column;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::prelude::*;
use datafusion_expr::{ident, lit, Expr};

pub const FARM_ID: &str = "farm_id";
pub const ACTIVITY_ID: &str = "activity_id";
pub const WELL_ID: &str = "well_id";
pub const CROP_TYPE: &str = "crop_type";

pub const ACTIVITY_COUNT: &str = "activity_count";
pub const UNIQUE_CROP_TYPES_COUNT: &str = "unique_crop_types_count";
pub const WELL_COUNT: &str = "well_count";
pub const SPRINKLERS_COUNT: &str = "sprinklers_count";
pub const SPRINKLERS_COUNT_KW: &str = "sprinklers_count_kw";
pub const PERCENTAGE_SUFFIX: &str = "_percentage";

pub const PROPERTY_AREA_SOURCE: &str = "area";
pub const PROPERTY_MAIN_TYPE_SOURCE: &str = "main_type";
pub const PROPERTY_AREA: &str = "property_area";
pub const PROPERTY_MAIN_TYPE: &str = "property_main_type";

pub const ACTIVITY_NUMERIC_COLUMNS: [&str; 4] = [
    "total_area_hectares",
    "productive_trees_count",
    "protected_house_count",
    "plantations_count",
];

pub const ACTIVITY_SUM_CATEGORICALS: [&str; 6] = [
    "farm_type",
    "irrigation_source",
    "irrigation_type",
    "farming_season",
    "protected_house_type",
    "plantations_type",
];

pub const ACTIVITY_DIVERSITY_CATEGORICALS: [&str; 2] = ["activity_status", "main_crop_type"];

pub const WELL_CATEGORICALS: [&str; 4] = [
    "well_possession_type",
    "well_is_active",
    "well_irrigation_source",
    "well_irrigation_type",
];

pub const CAPPED_COLUMNS: [&str; 6] = [
    PROPERTY_AREA,
    "total_area_hectares",
    "productive_trees_count",
    "protected_house_count",
    "plantations_count",
    WELL_COUNT,
];

/// Raw `Farms` layer name -> canonical activity column.
pub const RAW_ACTIVITY_COLUMNS: [(&str, &str); 15] = [
    ("HSRCode", ACTIVITY_ID),
    ("OB_HSRCode", FARM_ID),
    ("ActivityStatus", "activity_status"),
    ("FarmType", "farm_type"),
    ("MainCropsType", "main_crop_type"),
    ("CropsType", CROP_TYPE),
    ("IrragationSource", "irrigation_source"),
    ("IrragationType", "irrigation_type"),
    ("FarmingSeason", "farming_season"),
    ("TotalArea", "total_area_hectares"),
    ("ProductiveTreesNo", "productive_trees_count"),
    ("ProtectedHouseNo", "protected_house_count"),
    ("ProtectedHouseType", "protected_house_type"),
    ("PlantationsNo", "plantations_count"),
    ("PlantationsType", "plantations_type"),
];

/// Raw `Wells` layer name -> canonical well column.
pub const RAW_WELL_COLUMNS: [(&str, &str); 6] = [
    ("HSRCode", WELL_ID),
    ("OB_HSRCode", FARM_ID),
    ("PossessionType", "well_possession_type"),
    ("IsActive", "well_is_active"),
    ("IrragationSource", "well_irrigation_source"),
    ("IrrigationType", "well_irrigation_type"),
];

/// Raw `Property` layer name -> canonical property column.
pub const RAW_PROPERTY_COLUMNS: [(&str, &str); 3] = [
    ("OB_HSRCode", FARM_ID),
    ("SHAPE_Area", PROPERTY_AREA_SOURCE),
    ("MainType", PROPERTY_MAIN_TYPE_SOURCE),
];

/// Unqualified column reference that keeps dots as part of the name.
pub fn column(name: &str) -> Expr {
    ident(name)
}

/// Names of all columns of a DataFrame, in schema order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.schema()
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.schema().has_column_with_unqualified_name(name)
}

/// Validates that every column in `target_cols` exists in the DataFrame.
pub fn validate_columns<S: AsRef<str>>(df: &DataFrame, target_cols: &[S]) -> FarmLoadResult<()> {
    for col_name in target_cols {
        let col_name = col_name.as_ref();
        if !has_column(df, col_name) {
            return Err(FarmLoadError::MissingColumn(format!(
                "Column '{}' not found in DataFrame",
                col_name
            )));
        }
    }
    Ok(())
}

/// Data type of a column looked up by its unqualified name.
pub fn column_type(df: &DataFrame, name: &str) -> FarmLoadResult<DataType> {
    df.schema()
        .field_with_unqualified_name(name)
        .map(|f| f.data_type().clone())
        .map_err(|_| FarmLoadError::MissingColumn(format!("Column '{}' not found in DataFrame", name)))
}

/// Renames the columns listed in `mapping` that are present in the DataFrame and keeps the rest.
///
/// Every output column is re-aliased, so the result carries unqualified names only.
pub fn rename_columns(df: DataFrame, mapping: &[(&str, &str)]) -> FarmLoadResult<DataFrame> {
    let exprs: Vec<Expr> = df
        .schema()
        .iter()
        .map(|(qualifier, field)| {
            let name = field.name();
            let target = mapping
                .iter()
                .find(|(from, _)| from == name)
                .map_or(name.as_str(), |(_, to)| *to);
            Expr::Column(Column::new(qualifier.cloned(), name)).alias(target)
        })
        .collect();
    Ok(df.select(exprs)?)
}

/// Indicator label for a category code: float codes keep a decimal point (`2.0`), integer
/// codes do not (`2`).
pub fn category_label(code: f64, floating: bool) -> String {
    if floating {
        format!("{:?}", code)
    } else {
        format!("{}", code as i64)
    }
}

/// Indicator columns produced from `source` by the one-hot expander, in schema order.
///
/// A column qualifies when it is named `{source}_{code}` with a numeric code.
pub fn indicator_columns(df: &DataFrame, source: &str) -> Vec<String> {
    let prefix = format!("{}_", source);
    column_names(df)
        .into_iter()
        .filter(|name| {
            name.strip_prefix(&prefix)
                .is_some_and(|code| code.parse::<f64>().is_ok())
        })
        .collect()
}

/// Fails with `MissingKey` if `key` is null on any row.
pub async fn require_key(df: &DataFrame, key: &str) -> FarmLoadResult<()> {
    validate_columns(df, &[key])?;
    let rows = df.clone().filter(column(key).is_null())?.count().await?;
    if rows > 0 {
        return Err(FarmLoadError::MissingKey {
            column: key.to_string(),
            rows,
        });
    }
    Ok(())
}

/// Fails with `DuplicateKey` if any value of `key` appears on more than one row.
pub async fn require_unique_key(df: &DataFrame, key: &str) -> FarmLoadResult<()> {
    validate_columns(df, &[key])?;
    let rows = df
        .clone()
        .aggregate(vec![column(key)], vec![count(lit(1)).alias("__rows")])?
        .filter(column("__rows").gt(lit(1_i64)))?
        .count()
        .await?;
    if rows > 0 {
        return Err(FarmLoadError::DuplicateKey {
            column: key.to_string(),
            rows,
        });
    }
    Ok(())
}
