//! ## Activity summary
//!
//! Groups activity records by farm. Numeric measures and the indicators of "type" categoricals
//! are summed. Indicators of "diversity" categoricals (activity status, main crop type) are
//! reduced per row to "non-zero" before the group sum, or to a 0/1 presence flag when
//! [`DiversityReduction::Presence`] is configured.

use crate::exceptions::FarmLoadResult;
use crate::processing::zero_if_null;
use crate::schema::{
    column, indicator_columns, require_key, validate_columns, ACTIVITY_COUNT,
    UNIQUE_CROP_TYPES_COUNT,
};
use crate::settings::{ActivitySettings, DiversityReduction};
use crate::transformers::categorical_encoding::expand;
use crate::transformers::imputation::normalize;
use arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::{count_distinct, max, sum};
use datafusion::prelude::*;
use datafusion_expr::{cast, lit, Case as DFCase, Expr};
use tracing::{debug, info, Level};

/// 1 where the indicator is non-zero, else 0.
fn non_zero(indicator: &str) -> Expr {
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![(
            Box::new(column(indicator).not_eq(lit(0_i64))),
            Box::new(lit(1_i64)),
        )],
        else_expr: Some(Box::new(lit(0_i64))),
    })
}

/// Aggregates a normalized, one-hot expanded activity table to one row per farm.
///
/// Output columns: the key, `activity_count` (distinct activity ids),
/// `unique_crop_types_count` (distinct crop types), the summed numeric measures, then the
/// reduced indicators of every configured categorical. Rows are ordered by key.
pub async fn aggregate_activities(
    df: DataFrame,
    settings: &ActivitySettings,
) -> FarmLoadResult<DataFrame> {
    let key = settings.key.as_str();
    require_key(&df, key).await?;
    validate_columns(&df, &[&settings.activity_id, &settings.crop_type])?;
    validate_columns(&df, &settings.numeric_columns)?;

    let mut aggregates = vec![
        count_distinct(column(&settings.activity_id)).alias(ACTIVITY_COUNT),
        count_distinct(column(&settings.crop_type)).alias(UNIQUE_CROP_TYPES_COUNT),
    ];
    for name in &settings.numeric_columns {
        let value = zero_if_null(cast(column(name), DataType::Float64));
        aggregates.push(sum(value).alias(name));
    }
    for source in &settings.sum_categoricals {
        for indicator in indicator_columns(&df, source) {
            aggregates.push(sum(column(&indicator)).alias(indicator));
        }
    }
    for source in &settings.diversity_categoricals {
        for indicator in indicator_columns(&df, source) {
            let reduced = match settings.diversity_reduction {
                DiversityReduction::NonZeroCount => sum(non_zero(&indicator)),
                DiversityReduction::Presence => max(non_zero(&indicator)),
            };
            aggregates.push(reduced.alias(indicator));
        }
    }
    debug!(aggregates = aggregates.len(), "aggregating activities");

    Ok(df
        .aggregate(vec![column(key)], aggregates)?
        .sort(vec![column(key).sort(true, false)])?)
}

/// De-duplicates, normalizes, expands and aggregates a canonical activity table.
pub async fn process_activities(
    df: DataFrame,
    settings: &ActivitySettings,
) -> FarmLoadResult<DataFrame> {
    require_key(&df, &settings.key).await?;
    let df = if settings.drop_duplicates {
        df.distinct()?
    } else {
        df
    };
    let categoricals = settings.categoricals();
    let normalized = normalize(df, &categoricals).await?;
    let expanded = expand(normalized, &categoricals).await?;
    let summary = aggregate_activities(expanded, settings).await?;
    if tracing::enabled!(Level::INFO) {
        info!(farms = summary.clone().count().await?, "activity summary built");
    }
    Ok(summary)
}
