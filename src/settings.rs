//! ## Pipeline Settings
//!
//! Column names and policies used by the processing stages. Every field has a default that
//! matches the canonical schema in [`crate::schema`], so a settings file only needs to carry
//! the values it overrides:
//!
//! ```json
//! { "wells": { "kw_per_sprinkler": 30.0 }, "capper": { "factor": 3.0 } }
//! ```

use crate::exceptions::FarmLoadResult;
use crate::schema;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// How the indicator columns of a "diversity" categorical are reduced per farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityReduction {
    /// Count the activity rows whose indicator is non-zero.
    NonZeroCount,
    /// 1 when any activity of the farm carries the category, else 0.
    Presence,
}

/// What absent summary values become after the integration merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    Zero,
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivitySettings {
    pub key: String,
    pub activity_id: String,
    pub crop_type: String,
    /// Numeric measures summed per farm.
    pub numeric_columns: Vec<String>,
    /// Categoricals whose indicators are summed per farm.
    pub sum_categoricals: Vec<String>,
    /// Categoricals whose indicators are reduced with `diversity_reduction`.
    pub diversity_categoricals: Vec<String>,
    pub diversity_reduction: DiversityReduction,
    pub drop_duplicates: bool,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            key: schema::FARM_ID.to_string(),
            activity_id: schema::ACTIVITY_ID.to_string(),
            crop_type: schema::CROP_TYPE.to_string(),
            numeric_columns: strings(&schema::ACTIVITY_NUMERIC_COLUMNS),
            sum_categoricals: strings(&schema::ACTIVITY_SUM_CATEGORICALS),
            diversity_categoricals: strings(&schema::ACTIVITY_DIVERSITY_CATEGORICALS),
            diversity_reduction: DiversityReduction::NonZeroCount,
            drop_duplicates: true,
        }
    }
}

impl ActivitySettings {
    /// Every categorical the activity stage normalizes and expands.
    pub fn categoricals(&self) -> Vec<String> {
        self.sum_categoricals
            .iter()
            .chain(self.diversity_categoricals.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WellSettings {
    pub key: String,
    pub categoricals: Vec<String>,
    /// Estimated kW drawn by one sprinkler when no measurement exists.
    pub kw_per_sprinkler: f64,
    pub drop_duplicates: bool,
}

impl Default for WellSettings {
    fn default() -> Self {
        Self {
            key: schema::FARM_ID.to_string(),
            categoricals: strings(&schema::WELL_CATEGORICALS),
            kw_per_sprinkler: 25.0,
            drop_duplicates: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertySettings {
    pub key: String,
    pub area: String,
    pub main_type: String,
}

impl Default for PropertySettings {
    fn default() -> Self {
        Self {
            key: schema::FARM_ID.to_string(),
            area: schema::PROPERTY_AREA_SOURCE.to_string(),
            main_type: schema::PROPERTY_MAIN_TYPE_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    pub key: String,
    pub fill: FillPolicy,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            key: schema::FARM_ID.to_string(),
            fill: FillPolicy::Zero,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapperSettings {
    pub columns: Vec<String>,
    /// IQR multiplier `k` in `[Q1 - k*IQR, Q3 + k*IQR]`.
    pub factor: f64,
}

impl Default for CapperSettings {
    fn default() -> Self {
        Self {
            columns: strings(&schema::CAPPED_COLUMNS),
            factor: 1.5,
        }
    }
}

/// All settings of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub activities: ActivitySettings,
    pub wells: WellSettings,
    pub property: PropertySettings,
    pub merge: MergeSettings,
    pub capper: CapperSettings,
}

impl PipelineSettings {
    /// Loads settings from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> FarmLoadResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> FarmLoadResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
