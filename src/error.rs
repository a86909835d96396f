use std::path::PathBuf;

use polars::prelude::PolarsError;
use smartcore::error::Failed;
use thiserror::Error;

/// Errors raised while training or inspecting a dataset.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("dataset not found at {path:?}")]
    DatasetNotFound { path: PathBuf },
    #[error("required column {column:?} not found in dataset")]
    MissingColumn { column: String },
    #[error("dataset has {rows} usable rows, at least {required} are needed to split")]
    TooFewRows { rows: usize, required: usize },
    #[error("unsupported export format {path:?}, expected .csv or .parquet")]
    ExportFormat { path: PathBuf },
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error("classifier training failed: {0}")]
    Model(#[from] Failed),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Polars(#[from] PolarsError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the fitted imputer and scaler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreprocessError {
    #[error("cannot fit {stage} on an empty matrix")]
    EmptyData { stage: &'static str },
    #[error("column {column:?} has no observed values to fit the imputer on")]
    NoObservedValues { column: &'static str },
    #[error("expected {expected} feature columns, got {got}")]
    FeatureMismatch { expected: usize, got: usize },
    #[error("column {column:?} still holds missing values, impute before scaling")]
    MissingValues { column: &'static str },
}

/// Errors raised while persisting or loading the fitted artifacts.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to access artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode artifact {name}: {source}")]
    Encode {
        name: &'static str,
        #[source]
        source: bincode::Error,
    },
    #[error("failed to decode artifact {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("artifact {path:?} is incompatible: {reason}")]
    Incompatible { path: PathBuf, reason: String },
}

/// Request-scoped inference failure. Never escapes the HTTP handler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("failed to transform features: {0}")]
    Transform(#[from] PreprocessError),
    #[error("prediction failed: {0}")]
    Model(String),
}

impl PredictError {
    /// Stable machine-readable code for the failure class.
    pub fn reason(&self) -> &'static str {
        match self {
            PredictError::InvalidPayload(_) => "invalid_payload",
            PredictError::Transform(_) => "transform",
            PredictError::Model(_) => "model",
        }
    }
}

impl From<Failed> for PredictError {
    fn from(e: Failed) -> Self {
        PredictError::Model(e.to_string())
    }
}
