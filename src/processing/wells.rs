//! ## Well summary
//!
//! Groups well records by farm: `well_count`, one summed indicator per well category, each
//! indicator's share of `well_count` (`{indicator}_percentage`), and the sprinkler estimate.
//!
//! No sprinkler survey exists in the raw wells layer, so `sprinklers_count` defaults to
//! `well_count` and `sprinklers_count_kw` to `sprinklers_count * kw_per_sprinkler`. Both are
//! heuristics. If the wells table carries measured `sprinklers_count` / `sprinklers_count_kw`
//! columns, those are summed per farm instead.

use crate::exceptions::FarmLoadResult;
use crate::processing::zero_if_null;
use crate::schema::{
    column, has_column, indicator_columns, require_key, PERCENTAGE_SUFFIX, SPRINKLERS_COUNT,
    SPRINKLERS_COUNT_KW, WELL_COUNT,
};
use crate::settings::WellSettings;
use crate::transformers::categorical_encoding::expand;
use crate::transformers::imputation::normalize;
use arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::{count, sum};
use datafusion::prelude::*;
use datafusion_expr::{cast, lit, Expr};
use tracing::{info, Level};

fn as_float(name: &str) -> Expr {
    cast(column(name), DataType::Float64)
}

/// Aggregates a normalized, one-hot expanded well table to one row per farm with wells.
///
/// Percentages never divide by zero: a farm only appears here if it has at least one well.
pub async fn aggregate_wells(df: DataFrame, settings: &WellSettings) -> FarmLoadResult<DataFrame> {
    let key = settings.key.as_str();
    require_key(&df, key).await?;

    let indicators: Vec<String> = settings
        .categoricals
        .iter()
        .flat_map(|source| indicator_columns(&df, source))
        .collect();
    let measured_count = has_column(&df, SPRINKLERS_COUNT);
    let measured_kw = has_column(&df, SPRINKLERS_COUNT_KW);

    let mut aggregates = vec![count(lit(1)).alias(WELL_COUNT)];
    for indicator in &indicators {
        aggregates.push(sum(column(indicator)).alias(indicator));
    }
    if measured_count {
        aggregates.push(sum(zero_if_null(as_float(SPRINKLERS_COUNT))).alias(SPRINKLERS_COUNT));
    }
    if measured_kw {
        aggregates.push(sum(zero_if_null(as_float(SPRINKLERS_COUNT_KW))).alias(SPRINKLERS_COUNT_KW));
    }
    let grouped = df.aggregate(vec![column(key)], aggregates)?;

    let mut exprs = vec![column(key), column(WELL_COUNT)];
    exprs.extend(indicators.iter().map(|indicator| column(indicator)));
    for indicator in &indicators {
        let share = as_float(indicator) / as_float(WELL_COUNT);
        exprs.push(share.alias(format!("{}{}", indicator, PERCENTAGE_SUFFIX)));
    }
    let sprinklers = if measured_count {
        column(SPRINKLERS_COUNT)
    } else {
        column(WELL_COUNT).alias(SPRINKLERS_COUNT)
    };
    exprs.push(sprinklers);
    if measured_kw {
        exprs.push(column(SPRINKLERS_COUNT_KW));
    } else {
        let source = if measured_count {
            SPRINKLERS_COUNT
        } else {
            WELL_COUNT
        };
        let kw = as_float(source) * lit(settings.kw_per_sprinkler);
        exprs.push(kw.alias(SPRINKLERS_COUNT_KW));
    }
    if measured_count || measured_kw {
        info!(
            measured_count,
            measured_kw, "using measured sprinkler data instead of the well_count estimate"
        );
    }

    Ok(grouped
        .select(exprs)?
        .sort(vec![column(key).sort(true, false)])?)
}

/// De-duplicates, normalizes, expands and aggregates a canonical well table.
pub async fn process_wells(df: DataFrame, settings: &WellSettings) -> FarmLoadResult<DataFrame> {
    require_key(&df, &settings.key).await?;
    let df = if settings.drop_duplicates {
        df.distinct()?
    } else {
        df
    };
    let normalized = normalize(df, &settings.categoricals).await?;
    let expanded = expand(normalized, &settings.categoricals).await?;
    let summary = aggregate_wells(expanded, settings).await?;
    if tracing::enabled!(Level::INFO) {
        info!(farms = summary.clone().count().await?, "well summary built");
    }
    Ok(summary)
}
