//! Fitted transforms applied between normalization and the classifier.
//!
//! Both stages are fit on the training partition only and then applied
//! unchanged to the test partition and to every inference request.

use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::{Array, MutArray};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::PreprocessError;
use crate::features::{Feature, N_FEATURES};

/// Replaces NaN entries with the per-column mean seen during fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    statistics: Vec<f64>,
}

impl MeanImputer {
    pub fn fit(x: &DenseMatrix<f64>) -> Result<Self, PreprocessError> {
        let (rows, cols) = checked_shape(x, "imputer")?;
        let mut statistics = Vec::with_capacity(cols);
        for col in 0..cols {
            let observed: Vec<f64> = (0..rows)
                .map(|row| *x.get((row, col)))
                .filter(|v| !v.is_nan())
                .collect();
            if observed.is_empty() {
                return Err(PreprocessError::NoObservedValues {
                    column: Feature::ALL[col].column(),
                });
            }
            statistics.push(observed.iter().sum::<f64>() / observed.len() as f64);
        }
        Ok(Self { statistics })
    }

    pub fn transform(&self, x: &DenseMatrix<f64>) -> Result<DenseMatrix<f64>, PreprocessError> {
        let (rows, cols) = x.shape();
        check_width(cols, self.statistics.len())?;
        let mut out = x.clone();
        for row in 0..rows {
            for (col, fill) in self.statistics.iter().enumerate() {
                if x.get((row, col)).is_nan() {
                    out.set((row, col), *fill);
                }
            }
        }
        Ok(out)
    }

    pub fn statistics(&self) -> &[f64] {
        &self.statistics
    }
}

/// Standardizes every column to zero mean and unit variance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Uses the population variance. Constant columns keep a scale of 1 so
    /// they map to zero instead of dividing by zero.
    pub fn fit(x: &DenseMatrix<f64>) -> Result<Self, PreprocessError> {
        let (rows, cols) = checked_shape(x, "scaler")?;
        let mut means = Vec::with_capacity(cols);
        let mut scales = Vec::with_capacity(cols);
        for col in 0..cols {
            let values: Vec<f64> = (0..rows).map(|row| *x.get((row, col))).collect();
            if values.iter().any(|v| v.is_nan()) {
                return Err(PreprocessError::MissingValues {
                    column: Feature::ALL[col].column(),
                });
            }
            let mean = values.iter().sum::<f64>() / rows as f64;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / rows as f64;
            let std = variance.sqrt();
            means.push(mean);
            scales.push(if std > 0.0 { std } else { 1.0 });
        }
        Ok(Self { means, scales })
    }

    pub fn transform(&self, x: &DenseMatrix<f64>) -> Result<DenseMatrix<f64>, PreprocessError> {
        let (rows, cols) = x.shape();
        check_width(cols, self.means.len())?;
        let mut out = x.clone();
        for row in 0..rows {
            for col in 0..cols {
                let scaled = (*x.get((row, col)) - self.means[col]) / self.scales[col];
                out.set((row, col), scaled);
            }
        }
        Ok(out)
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

fn checked_shape(
    x: &DenseMatrix<f64>,
    stage: &'static str,
) -> Result<(usize, usize), PreprocessError> {
    let (rows, cols) = x.shape();
    if rows == 0 {
        return Err(PreprocessError::EmptyData { stage });
    }
    check_width(cols, N_FEATURES)?;
    Ok((rows, cols))
}

fn check_width(got: usize, expected: usize) -> Result<(), PreprocessError> {
    if got != expected {
        return Err(PreprocessError::FeatureMismatch { expected, got });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[[f64; N_FEATURES]]) -> DenseMatrix<f64> {
        let values: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        DenseMatrix::new(rows.len(), N_FEATURES, values, false)
    }

    #[test]
    fn imputer_fills_with_observed_mean() {
        let mut a = [1.0; N_FEATURES];
        let mut b = [3.0; N_FEATURES];
        let c = [f64::NAN; N_FEATURES];
        a[0] = 40.0;
        b[0] = f64::NAN;
        let x = matrix(&[a, b, c]);

        let imputer = MeanImputer::fit(&x).unwrap();
        assert_eq!(imputer.statistics()[0], 40.0);
        assert_eq!(imputer.statistics()[1], 2.0);

        let filled = imputer.transform(&x).unwrap();
        assert_eq!(*filled.get((1, 0)), 40.0);
        assert_eq!(*filled.get((2, 5)), 2.0);
        assert_eq!(*filled.get((0, 5)), 1.0);
    }

    #[test]
    fn imputer_rejects_column_without_observations() {
        let mut row = [1.0; N_FEATURES];
        row[Feature::Thal.index()] = f64::NAN;
        let err = MeanImputer::fit(&matrix(&[row, row])).unwrap_err();
        assert_eq!(err, PreprocessError::NoObservedValues { column: "thal" });
    }

    #[test]
    fn scaler_centers_and_scales() {
        let mut a = [5.0; N_FEATURES];
        let mut b = [5.0; N_FEATURES];
        a[0] = 1.0;
        b[0] = 3.0;
        let x = matrix(&[a, b]);

        let scaler = StandardScaler::fit(&x).unwrap();
        assert_eq!(scaler.means()[0], 2.0);
        assert_eq!(scaler.scales()[0], 1.0);
        assert_eq!(scaler.scales()[1], 1.0);

        let scaled = scaler.transform(&x).unwrap();
        assert_eq!(*scaled.get((0, 0)), -1.0);
        assert_eq!(*scaled.get((1, 0)), 1.0);
        assert_eq!(*scaled.get((1, 1)), 0.0);
    }

    #[test]
    fn scaler_refuses_unimputed_input() {
        let mut row = [1.0; N_FEATURES];
        row[Feature::Cholesterol.index()] = f64::NAN;
        let err = StandardScaler::fit(&matrix(&[row])).unwrap_err();
        assert_eq!(err, PreprocessError::MissingValues { column: "chol" });
    }

    #[test]
    fn transforms_check_width() {
        let imputer = MeanImputer::fit(&matrix(&[[1.0; N_FEATURES]])).unwrap();
        let narrow = DenseMatrix::new(1, 3, vec![1.0, 2.0, 3.0], false);
        assert_eq!(
            imputer.transform(&narrow).unwrap_err(),
            PreprocessError::FeatureMismatch { expected: N_FEATURES, got: 3 }
        );
    }
}
