//! ## Property extraction
//!
//! Property records are one per farm, so no aggregation happens here: the stage selects the
//! key, the area and the main type, renames them, and rejects tables that break the one-to-one
//! relationship.

use crate::exceptions::FarmLoadResult;
use crate::schema::{
    column, require_key, require_unique_key, validate_columns, PROPERTY_AREA, PROPERTY_MAIN_TYPE,
};
use crate::settings::PropertySettings;
use datafusion::prelude::*;
use tracing::info;

/// Returns `{key, property_area, property_main_type}`, one row per input row.
///
/// Fails with `DuplicateKey` when two property rows share a farm and with `MissingKey` when
/// a row has no farm.
pub async fn extract_property(
    df: DataFrame,
    settings: &PropertySettings,
) -> FarmLoadResult<DataFrame> {
    let key = settings.key.as_str();
    validate_columns(&df, &[key, settings.area.as_str(), settings.main_type.as_str()])?;
    require_key(&df, key).await?;
    require_unique_key(&df, key).await?;
    let extracted = df.select(vec![
        column(key).alias(key),
        column(&settings.area).alias(PROPERTY_AREA),
        column(&settings.main_type).alias(PROPERTY_MAIN_TYPE),
    ])?;
    info!("property table extracted");
    Ok(extracted)
}
