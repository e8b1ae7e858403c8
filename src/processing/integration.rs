//! ## Integration merge
//!
//! Joins the per-farm tables on the farm key:
//!
//! 1. property LEFT JOIN activity summary
//! 2. ... LEFT JOIN well summary
//! 3. ... RIGHT JOIN visits
//!
//! Visits drive the result: exactly one output row per visited farm, whether or not the farm
//! has property, activity or well data. Summary columns of farms without activities or wells
//! are zero under [`FillPolicy::Zero`]: no wells means zero wells, not an unknown count.
//! Property and visits columns keep their nulls.

use crate::exceptions::FarmLoadResult;
use crate::processing::zero_if_null;
use crate::schema::{column, column_names, rename_columns, require_key, require_unique_key};
use crate::settings::{FillPolicy, MergeSettings};
use datafusion::common::Column;
use datafusion::prelude::*;
use datafusion_expr::Expr;
use tracing::{debug, info, Level};

const RIGHT_KEY: &str = "__right_key";

/// Joins `right` onto `left` by `key`, keeping a single key column taken from the driving side.
fn join_on_key(
    left: DataFrame,
    right: DataFrame,
    join_type: JoinType,
    key: &str,
) -> FarmLoadResult<DataFrame> {
    let left = rename_columns(left, &[])?;
    let right = rename_columns(right, &[(key, RIGHT_KEY)])?;
    let joined = left.join(right, join_type, &[key], &[RIGHT_KEY], None)?;
    let driving_key = match join_type {
        JoinType::Right => RIGHT_KEY,
        _ => key,
    };
    let mut exprs = vec![column(driving_key).alias(key)];
    for (qualifier, field) in joined.schema().iter() {
        let name = field.name();
        if name == key || name == RIGHT_KEY {
            continue;
        }
        exprs.push(Expr::Column(Column::new(qualifier.cloned(), name)).alias(name));
    }
    Ok(joined.select(exprs)?)
}

/// Replaces nulls with zero in `columns`, leaving the others as they are.
fn fill_zero(df: DataFrame, columns: &[String]) -> FarmLoadResult<DataFrame> {
    let exprs: Vec<Expr> = df
        .schema()
        .iter()
        .map(|(qualifier, field)| {
            let name = field.name();
            let original = Expr::Column(Column::new(qualifier.cloned(), name));
            if columns.contains(name) {
                zero_if_null(original).alias(name)
            } else {
                original
            }
        })
        .collect();
    Ok(df.select(exprs)?)
}

/// Builds the design matrix: one row per farm of `visits`, ordered by key.
///
/// Fails with `DuplicateKey` if a farm appears twice in `visits` or in `property`, and with
/// `MissingKey` if a visit has no farm.
pub async fn integrate(
    property: DataFrame,
    activities: DataFrame,
    wells: DataFrame,
    visits: DataFrame,
    settings: &MergeSettings,
) -> FarmLoadResult<DataFrame> {
    let key = settings.key.as_str();
    require_key(&visits, key).await?;
    require_unique_key(&visits, key).await?;
    require_unique_key(&property, key).await?;

    let summary_columns: Vec<String> = column_names(&activities)
        .into_iter()
        .chain(column_names(&wells))
        .filter(|name| name != key)
        .collect();
    debug!(columns = summary_columns.len(), "summary columns to fill");

    let merged = join_on_key(property, activities, JoinType::Left, key)?;
    let merged = join_on_key(merged, wells, JoinType::Left, key)?;
    let merged = join_on_key(merged, visits, JoinType::Right, key)?;
    let merged = match settings.fill {
        FillPolicy::Zero => fill_zero(merged, &summary_columns)?,
        FillPolicy::Null => merged,
    };
    let merged = merged.sort(vec![column(key).sort(true, false)])?;
    if tracing::enabled!(Level::INFO) {
        info!(rows = merged.clone().count().await?, "integrated design matrix");
    }
    Ok(merged)
}
