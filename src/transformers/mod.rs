//! # Transformer Implementations
//!
//! Stateful table transforms shared by the processing stages and the fitted model pipeline.

pub mod categorical_encoding;
pub mod imputation;
pub mod outlier_handling;
