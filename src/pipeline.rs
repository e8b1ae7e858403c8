//! ## Transformer Pipeline
//!
//! Core abstractions for fitting and applying chains of table transforms.
//!
//! - The [`Transformer`] trait is the common interface of the stateful stages
//!   (categorical normalization, one-hot expansion, outlier capping): `fit` learns state from a
//!   reference table, `transform` applies the learned state to any table.
//! - The [`Pipeline`] struct chains transformers. It is fitted once on training data and then
//!   only used through `transform`, so inference reads the state written at fit time.
//! - Macros [`crate::impl_transformer`] and [`crate::make_pipeline`] implement the trait for a type
//!   with matching inherent methods and build pipelines without manual boxing.

use crate::exceptions::{FarmLoadError, FarmLoadResult};
use async_trait::async_trait;
use datafusion::prelude::*;
use std::time::Instant;
use tracing::info;

/// A fit/transform stage over farm tables.
///
/// `transform` only extends the DataFrame's logical plan; nothing is executed until the
/// result is collected.
#[async_trait]
pub trait Transformer {
    /// Learns the stage's state (modes, category sets, bounds) from `df`.
    async fn fit(&mut self, df: &DataFrame) -> FarmLoadResult<()>;

    /// Applies the learned state, returning a new DataFrame.
    fn transform(&self, df: DataFrame) -> FarmLoadResult<DataFrame>;

    /// True when `transform` needs a prior `fit`.
    fn is_stateful(&self) -> bool;

    /// True once `fit` has completed (always true for stateless transformers).
    fn is_fitted(&self) -> bool;
}

/// A boxed pipeline step.
pub type Step = Box<dyn Transformer + Send + Sync>;

/// Implements [`Transformer`] by forwarding to inherent methods of the same names:
/// `fit`, `transform`, `inherent_is_stateful` and `inherent_is_fitted`.
#[macro_export]
macro_rules! impl_transformer {
    ($ty:ty) => {
        #[async_trait::async_trait]
        impl $crate::pipeline::Transformer for $ty {
            async fn fit(
                &mut self,
                df: &datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::FarmLoadResult<()> {
                <$ty>::fit(self, df).await
            }
            fn transform(
                &self,
                df: datafusion::prelude::DataFrame,
            ) -> $crate::exceptions::FarmLoadResult<datafusion::prelude::DataFrame> {
                <$ty>::transform(self, df)
            }
            fn is_stateful(&self) -> bool {
                <$ty>::inherent_is_stateful(self)
            }
            fn is_fitted(&self) -> bool {
                <$ty>::inherent_is_fitted(self)
            }
        }
    };
}

/// Named steps applied in order, each to the previous step's output.
pub struct Pipeline {
    steps: Vec<(String, Step)>,
    verbose: bool,
}

impl Pipeline {
    /// With `verbose` set, every step logs its name and elapsed time.
    pub fn new(steps: Vec<(String, Step)>, verbose: bool) -> Self {
        Self { steps, verbose }
    }

    fn ensure_steps(&self) -> FarmLoadResult<()> {
        if self.steps.is_empty() {
            return Err(FarmLoadError::InvalidParameter(
                "a pipeline needs at least one step".to_string(),
            ));
        }
        Ok(())
    }

    /// Names of the steps, in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// True once every stateful step has been fitted.
    pub fn is_fitted(&self) -> bool {
        self.steps.iter().all(|(_, step)| step.is_fitted())
    }

    /// Fits every step on the output of the one before and returns the last output.
    pub async fn fit(&mut self, df: &DataFrame) -> FarmLoadResult<DataFrame> {
        self.ensure_steps()?;
        let verbose = self.verbose;
        let mut output = df.clone();
        for (name, step) in &mut self.steps {
            let started = Instant::now();
            step.fit(&output).await?;
            output = step.transform(output)?;
            if verbose {
                info!(step = %name, elapsed = ?started.elapsed(), "step fitted");
            }
        }
        Ok(output)
    }

    /// Runs every step's `transform` with the state learned at fit time.
    ///
    /// Fails with `NotFitted` if a stateful step was never fitted.
    pub fn transform(&self, df: DataFrame) -> FarmLoadResult<DataFrame> {
        self.ensure_steps()?;
        let mut output = df;
        for (name, step) in &self.steps {
            if !step.is_fitted() {
                return Err(FarmLoadError::NotFitted(format!("pipeline step '{}'", name)));
            }
            if self.verbose {
                info!(step = %name, "applying step");
            }
            output = step.transform(output)?;
        }
        Ok(output)
    }

    /// Same as [`Pipeline::fit`]; the fitted output is the transformed table.
    pub async fn fit_transform(&mut self, df: &DataFrame) -> FarmLoadResult<DataFrame> {
        self.fit(df).await
    }
}

/// Builds a [`Pipeline`] from `(name, transformer)` pairs, boxing each transformer.
///
/// # Example
///
/// ```rust,no_run
/// use farm_load::make_pipeline;
/// use farm_load::transformers::outlier_handling::OutlierCapper;
///
/// let capping = make_pipeline!(
///     false,
///     ("capper", OutlierCapper::new(vec!["well_count".to_string()], 1.5)),
/// );
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($verbose:expr, $(($name:expr, $transformer:expr)),+ $(,)?) => {{
        let steps: Vec<(String, $crate::pipeline::Step)> =
            vec![$(($name.to_string(), Box::new($transformer))),+];
        $crate::pipeline::Pipeline::new(steps, $verbose)
    }};
}
