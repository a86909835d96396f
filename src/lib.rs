//! Heart-disease risk pipeline: clean and encode the UCI dataset, fit an
//! impute → scale → random-forest chain, and serve predictions from the
//! persisted artifacts.

pub mod artifacts;
pub mod clean;
pub mod error;
pub mod features;
pub mod inspect;
pub mod model;
pub mod preprocessing;
pub mod records;
pub mod server;
pub mod train;

#[cfg(test)]
mod test_support;

pub use error::{ArtifactError, PipelineError, PredictError, PreprocessError};
pub use features::{Feature, FeatureVector, N_FEATURES};
pub use model::{Prediction, Predictor};
