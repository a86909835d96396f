use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use polars_io::parquet::ParquetWriter;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::PipelineError;
use crate::features::{normalize, Feature, RawValue, N_FEATURES};
use crate::records::{HeartRecord, TARGET_COLUMN};

/// Load the raw dataset with every column as text, so labels, `TRUE`/`FALSE`
/// flags and numbers all reach the shared normalizer untouched. `?` cells are
/// read as null in every column.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame, PipelineError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(PipelineError::DatasetNotFound {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path)?;

    let df = CsvReader::new(file)
        .has_header(true)
        .infer_schema(Some(0))
        .with_null_values(Some(NullValues::AllColumnsSingle(
            crate::features::PLACEHOLDER.to_string(),
        )))
        .finish()?;
    log::info!("loaded {} rows x {} columns from {}", df.height(), df.width(), path.display());
    Ok(df)
}

pub fn write_csv<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<(), PipelineError> {
    let mut file = File::create(path)?;

    CsvWriter::new(&mut file).finish(df)?;

    Ok(())
}

pub fn write_parquet<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<(), PipelineError> {
    let mut file = File::create(path)?;

    ParquetWriter::new(&mut file).finish(df)?;

    Ok(())
}

/// Names from `wanted` that the frame does not carry.
pub fn absent_columns<'a>(df: &DataFrame, wanted: &[&'a str]) -> Vec<&'a str> {
    let present = df.get_column_names();
    wanted
        .iter()
        .filter(|name| !present.contains(name))
        .copied()
        .collect()
}

pub fn require_columns(df: &DataFrame) -> Result<(), PipelineError> {
    match absent_columns(df, &HeartRecord::required_columns()).first() {
        Some(column) => Err(PipelineError::MissingColumn {
            column: column.to_string(),
        }),
        None => Ok(()),
    }
}

/// Run one column through the shared normalizer. Whatever dtype polars
/// inferred, cells reach [`normalize`] as text.
fn encode_feature(column: Series, feature: Feature) -> Result<Option<Series>, PolarsError> {
    let text = column.cast(&DataType::Utf8)?;
    let encoded: Vec<Option<f64>> = text
        .utf8()?
        .into_iter()
        .map(|cell| normalize(feature, RawValue::from(cell)))
        .collect();
    Ok(Option::from(Series::new(column.name(), encoded)))
}

/// Severity above zero is disease. Unknown severity counts as healthy.
fn binarize_target(column: Series) -> Result<Option<Series>, PolarsError> {
    let text = column.cast(&DataType::Utf8)?;
    let mut unknown = 0usize;
    let labels: Vec<i32> = text
        .utf8()?
        .into_iter()
        .map(|cell| match HeartRecord::label_from_severity(cell) {
            Some(label) => label,
            None => {
                unknown += 1;
                0
            }
        })
        .collect();
    if unknown > 0 {
        log::warn!("{unknown} row(s) have no usable {TARGET_COLUMN:?} value, labelled 0");
    }
    Ok(Option::from(Series::new(column.name(), labels)))
}

/// Normalize the given feature columns in place, leaving others untouched.
pub fn clean_features(mut df: LazyFrame, features: &[Feature]) -> LazyFrame {
    for feature in features.iter().copied() {
        df = df.with_column(
            col(feature.column())
                .alias(feature.column())
                .apply(
                    move |s| encode_feature(s, feature),
                    GetOutput::from_type(DataType::Float64),
                ),
        );
    }
    df
}

/// Model-ready frame: the 13 encoded features in order, then the binary target.
pub fn clean_frame(df: DataFrame) -> Result<DataFrame, PipelineError> {
    require_columns(&df)?;
    let columns: Vec<Expr> = HeartRecord::required_columns().into_iter().map(col).collect();
    let cleaned = clean_features(df.lazy(), &Feature::ALL)
        .with_column(
            col(TARGET_COLUMN)
                .alias(TARGET_COLUMN)
                .apply(binarize_target, GetOutput::from_type(DataType::Int32)),
        )
        .select(columns)
        .collect()?;
    Ok(cleaned)
}

pub fn feature_and_target(in_df: &DataFrame) -> PolarsResult<(DataFrame, DataFrame)> {
    let features = in_df.select(Feature::ALL.iter().map(|f| f.column()))?;
    let target = in_df.select([TARGET_COLUMN])?;

    Ok((features, target))
}

/// Row-major matrix in model column order. Nulls become NaN for the imputer.
pub fn convert_features_to_matrix(in_df: &DataFrame) -> Result<DenseMatrix<f64>, PipelineError> {
    let nrows = in_df.height();
    let mut xs = vec![f64::NAN; nrows * N_FEATURES];

    for (col_idx, feature) in Feature::ALL.iter().enumerate() {
        let values = in_df.column(feature.column())?.f64()?;
        for (row_idx, value) in values.into_iter().enumerate() {
            if let Some(value) = value {
                xs[row_idx * N_FEATURES + col_idx] = value;
            }
        }
    }

    Ok(DenseMatrix::new(nrows, N_FEATURES, xs, false))
}

pub fn target_vector(target: &DataFrame) -> PolarsResult<Vec<i32>> {
    Ok(target
        .column(TARGET_COLUMN)?
        .i32()?
        .into_iter()
        .map(|label| label.unwrap_or(0))
        .collect())
}

/// Cells left missing in the feature columns after normalization.
pub fn missing_cells(features: &DataFrame) -> usize {
    features.get_columns().iter().map(|s| s.null_count()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartcore::linalg::basic::arrays::Array;

    fn raw_frame() -> DataFrame {
        df!(
            "id" => &[1, 2, 3],
            "age" => &["63", "?", "41"],
            "sex" => &["Male", "Female", "Other"],
            "cp" => &["typical angina", "asymptomatic", "?"],
            "trestbps" => &["145", "160", "130"],
            "chol" => &["233", "286", "0"],
            "fbs" => &["TRUE", "FALSE", ""],
            "restecg" => &["lv hypertrophy", "normal", "st-t wave abnormality"],
            "thalch" => &["150", "108", "172"],
            "exang" => &["FALSE", "TRUE", "FALSE"],
            "oldpeak" => &["2.3", "1.5", "1.4"],
            "slope" => &["downsloping", "flat", "upsloping"],
            "ca" => &["0", "3", "?"],
            "thal" => &["fixed defect", "normal", "reversable defect"],
            "num" => &["0", "2", "?"]
        )
        .unwrap()
    }

    #[test]
    fn clean_frame_encodes_in_model_order() {
        let cleaned = clean_frame(raw_frame()).unwrap();
        let names = cleaned.get_column_names();
        assert_eq!(names.len(), N_FEATURES + 1);
        assert_eq!(names[0], "age");
        assert_eq!(names[N_FEATURES], TARGET_COLUMN);
        assert!(!names.contains(&"id"));

        let sex: Vec<Option<f64>> = cleaned.column("sex").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(sex, vec![Some(1.0), Some(0.0), None]);

        let cp: Vec<Option<f64>> = cleaned.column("cp").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(cp, vec![Some(0.0), Some(3.0), None]);

        let fbs: Vec<Option<f64>> = cleaned.column("fbs").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(fbs, vec![Some(1.0), Some(0.0), None]);
    }

    #[test]
    fn target_is_binarized() {
        let cleaned = clean_frame(raw_frame()).unwrap();
        let (_, target) = feature_and_target(&cleaned).unwrap();
        assert_eq!(target_vector(&target).unwrap(), vec![0, 1, 0]);
    }

    #[test]
    fn matrix_marks_missing_as_nan() {
        let cleaned = clean_frame(raw_frame()).unwrap();
        let (features, _) = feature_and_target(&cleaned).unwrap();
        let x = convert_features_to_matrix(&features).unwrap();
        assert_eq!(x.shape(), (3, N_FEATURES));
        assert_eq!(*x.get((0, Feature::Age.index())), 63.0);
        assert!(x.get((1, Feature::Age.index())).is_nan());
        assert_eq!(*x.get((2, Feature::Thal.index())), 3.0);
        assert_eq!(missing_cells(&features), 5);
    }

    #[test]
    fn absent_required_column_is_an_error() {
        let df = raw_frame().drop("chol").unwrap();
        match clean_frame(df) {
            Err(PipelineError::MissingColumn { column }) => assert_eq!(column, "chol"),
            other => panic!("expected missing column error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_csv("/nonexistent/heart_disease_uci.csv").unwrap_err();
        assert!(matches!(err, PipelineError::DatasetNotFound { .. }));
    }
}
