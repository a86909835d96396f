use std::path::{Path, PathBuf};
use std::time::Instant;

use smartcore::linalg::basic::arrays::Array;
use smartcore::metrics::accuracy;
use smartcore::model_selection::train_test_split;
use sysinfo::{PidExt, ProcessExt, System, SystemExt};

use crate::artifacts::{self, ArtifactPaths};
use crate::clean::{
    clean_frame, convert_features_to_matrix, feature_and_target, missing_cells, read_csv,
    target_vector,
};
use crate::error::PipelineError;
use crate::model::{fit_forest, Predictor, RANDOM_SEED};
use crate::preprocessing::{MeanImputer, StandardScaler};

pub const TEST_SIZE: f32 = 0.2;

/// Below this the 80/20 split can leave the test partition empty.
pub const MIN_ROWS: usize = 5;

#[derive(Clone, Debug)]
pub struct TrainOptions {
    pub dataset: PathBuf,
    pub artifacts: ArtifactPaths,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub missing_cells: usize,
    pub accuracy: f64,
}

/// Resident memory of this process in bytes, 0 when it cannot be read.
fn monitor_memory() -> u64 {
    let mut sys = System::new();
    match sysinfo::get_current_pid() {
        Ok(pid) if sys.refresh_process(pid) => sys.process(pid).map(|p| p.memory()).unwrap_or(0),
        Ok(pid) => {
            log::debug!("process {} not found for memory report", pid.as_u32());
            0
        }
        Err(e) => {
            log::debug!("memory report unavailable: {e}");
            0
        }
    }
}

/// Fit imputer → scaler → forest on the dataset and persist them.
/// Nothing is written unless every stage succeeded.
pub fn run(options: &TrainOptions) -> Result<TrainingReport, PipelineError> {
    let start_time = Instant::now();
    let start_memory = monitor_memory();

    let (predictor, report) = fit(&options.dataset)?;
    artifacts::save(&options.artifacts, &predictor)?;

    log::info!(
        "saved artifacts to {}, {}, {}",
        options.artifacts.imputer.display(),
        options.artifacts.scaler.display(),
        options.artifacts.model.display()
    );
    log::info!("training took {:?}", start_time.elapsed());
    log::debug!(
        "memory delta: {} bytes",
        monitor_memory().saturating_sub(start_memory)
    );
    Ok(report)
}

/// Everything `run` does except persisting.
pub fn fit(dataset: &Path) -> Result<(Predictor, TrainingReport), PipelineError> {
    let df = clean_frame(read_csv(dataset)?)?;
    let (features, target) = feature_and_target(&df)?;

    let rows = features.height();
    if rows < MIN_ROWS {
        return Err(PipelineError::TooFewRows {
            rows,
            required: MIN_ROWS,
        });
    }
    let missing = missing_cells(&features);
    if missing > 0 {
        log::warn!("{missing} feature value(s) still missing after cleaning, the imputer will fill them");
    }

    let x = convert_features_to_matrix(&features)?;
    let y = target_vector(&target)?;

    let (x_train, x_test, y_train, y_test) =
        train_test_split(&x, &y, TEST_SIZE, true, Some(RANDOM_SEED));
    let (train_rows, _) = x_train.shape();
    let (test_rows, _) = x_test.shape();
    log::info!("split {rows} rows into {train_rows} train / {test_rows} test");

    let imputer = MeanImputer::fit(&x_train)?;
    let x_train = imputer.transform(&x_train)?;
    let x_test = imputer.transform(&x_test)?;

    let scaler = StandardScaler::fit(&x_train)?;
    let x_train = scaler.transform(&x_train)?;
    let x_test = scaler.transform(&x_test)?;

    let classifier = fit_forest(&x_train, &y_train)?;
    let y_hat = classifier.predict(&x_test)?;
    let score = accuracy(&y_test, &y_hat);
    log::info!("held-out accuracy: {score:.4}");

    let report = TrainingReport {
        rows,
        train_rows,
        test_rows,
        missing_cells: missing,
        accuracy: score,
    };
    Ok((Predictor::new(imputer, scaler, classifier), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_dataset;

    #[test]
    fn training_writes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("heart.csv");
        write_dataset(&dataset, 100, &[]);
        let options = TrainOptions {
            dataset,
            artifacts: ArtifactPaths::in_dir(dir.path()),
        };

        let report = run(&options).unwrap();
        assert_eq!(report.rows, 100);
        assert_eq!(report.test_rows, 20);
        assert_eq!(report.train_rows, 80);
        assert!(report.missing_cells > 0);
        assert!((0.0..=1.0).contains(&report.accuracy));
        assert!(options.artifacts.iter().all(|p| p.exists()));

        let loaded = artifacts::load(&options.artifacts).unwrap();
        let prediction = loaded
            .predict_json(&serde_json::json!({ "age": 67, "cp": "asymptomatic" }))
            .unwrap();
        assert!(prediction.prediction <= 1);
    }

    #[test]
    fn training_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("heart.csv");
        write_dataset(&dataset, 80, &[]);

        let (_, first) = fit(&dataset).unwrap();
        let (_, second) = fit(&dataset).unwrap();
        assert_eq!(first, second);
    }

    fn column_mean(x: &smartcore::linalg::basic::matrix::DenseMatrix<f64>, col: usize) -> f64 {
        let (rows, _) = x.shape();
        let observed: Vec<f64> = (0..rows)
            .map(|row| *x.get((row, col)))
            .filter(|v| !v.is_nan())
            .collect();
        observed.iter().sum::<f64>() / observed.len() as f64
    }

    #[test]
    fn transforms_are_fit_on_training_partition() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("heart.csv");
        write_dataset(&dataset, 100, &[]);
        let (predictor, _) = fit(&dataset).unwrap();

        let df = clean_frame(read_csv(&dataset).unwrap()).unwrap();
        let (features, target) = feature_and_target(&df).unwrap();
        let x = convert_features_to_matrix(&features).unwrap();
        let y = target_vector(&target).unwrap();
        let (x_train, _, _, _) = train_test_split(&x, &y, TEST_SIZE, true, Some(RANDOM_SEED));

        let chol = crate::features::Feature::Cholesterol.index();
        assert!(features.column("chol").unwrap().null_count() > 0);
        let train_mean = column_mean(&x_train, chol);
        assert!((predictor.imputer().statistics()[chol] - train_mean).abs() < 1e-9);
        assert!((column_mean(&x, chol) - train_mean).abs() > 1e-9);

        let imputed = predictor.imputer().transform(&x_train).unwrap();
        for col in 0..crate::features::N_FEATURES {
            let expected = column_mean(&imputed, col);
            assert!((predictor.scaler().means()[col] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn missing_dataset_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let options = TrainOptions {
            dataset: dir.path().join("heart_disease_uci.csv"),
            artifacts: ArtifactPaths::in_dir(dir.path()),
        };

        let err = run(&options).unwrap_err();
        assert!(matches!(err, PipelineError::DatasetNotFound { .. }));
        assert!(!options.artifacts.any_exists());
    }

    #[test]
    fn absent_column_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("heart.csv");
        write_dataset(&dataset, 50, &["thal"]);
        let options = TrainOptions {
            dataset,
            artifacts: ArtifactPaths::in_dir(dir.path()),
        };

        match run(&options) {
            Err(PipelineError::MissingColumn { column }) => assert_eq!(column, "thal"),
            other => panic!("expected missing column, got {other:?}"),
        }
        assert!(!options.artifacts.any_exists());
    }

    #[test]
    fn tiny_dataset_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("heart.csv");
        write_dataset(&dataset, 3, &[]);

        let err = fit(&dataset).err().unwrap();
        assert!(matches!(err, PipelineError::TooFewRows { rows: 3, .. }));
    }
}
