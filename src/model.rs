use serde::Serialize;
use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::error::Failed;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::PredictError;
use crate::features::{FeatureVector, N_FEATURES};
use crate::preprocessing::{MeanImputer, StandardScaler};

pub const N_TREES: u16 = 100;
pub const RANDOM_SEED: u64 = 42;

pub type Forest = RandomForestClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

pub fn forest_parameters() -> RandomForestClassifierParameters {
    RandomForestClassifierParameters {
        n_trees: N_TREES,
        seed: RANDOM_SEED,
        ..Default::default()
    }
}

pub fn fit_forest(x: &DenseMatrix<f64>, y: &Vec<i32>) -> Result<Forest, Failed> {
    RandomForestClassifier::fit(x, y, forest_parameters())
}

/// Binary outcome of one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub prediction: u8,
}

/// The fitted impute → scale → classify chain. Built once at startup and
/// shared read-only between requests.
pub struct Predictor {
    imputer: MeanImputer,
    scaler: StandardScaler,
    classifier: Forest,
}

impl Predictor {
    pub fn new(imputer: MeanImputer, scaler: StandardScaler, classifier: Forest) -> Self {
        Self {
            imputer,
            scaler,
            classifier,
        }
    }

    pub fn imputer(&self) -> &MeanImputer {
        &self.imputer
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &Forest {
        &self.classifier
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, PredictError> {
        let row = DenseMatrix::new(1, N_FEATURES, features.to_row().to_vec(), false);
        let imputed = self.imputer.transform(&row)?;
        let scaled = self.scaler.transform(&imputed)?;
        let labels = self.classifier.predict(&scaled)?;
        match labels.first().copied() {
            Some(0) => Ok(Prediction { prediction: 0 }),
            Some(1) => Ok(Prediction { prediction: 1 }),
            Some(other) => Err(PredictError::Model(format!(
                "classifier returned unexpected label {other}"
            ))),
            None => Err(PredictError::Model("classifier returned no label".to_string())),
        }
    }

    pub fn predict_json(&self, payload: &serde_json::Value) -> Result<Prediction, PredictError> {
        let features = FeatureVector::from_json(payload)?;
        let missing = features.missing();
        if !missing.is_empty() {
            log::debug!("imputing {} missing feature(s): {:?}", missing.len(), missing);
        }
        self.predict(&features)
    }
}
