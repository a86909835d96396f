use std::fmt;
use std::path::{Path, PathBuf};

use polars::prelude::*;

use crate::clean::{absent_columns, clean_features, read_csv, write_csv, write_parquet};
use crate::error::PipelineError;
use crate::features::Feature;
use crate::records::HeartRecord;

#[derive(Clone, Debug)]
pub struct InspectOptions {
    pub dataset: PathBuf,
    pub export: Option<PathBuf>,
}

/// Missing-value counts after the shared cleaning step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingReport {
    pub rows: usize,
    /// Every column in the file, in file order, with its missing count.
    pub missing: Vec<(String, usize)>,
    /// Expected columns the file does not have.
    pub absent: Vec<&'static str>,
}

impl MissingReport {
    pub fn missing_in(&self, column: &str) -> Option<usize> {
        self.missing
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, count)| *count)
    }
}

impl fmt::Display for MissingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for column in &self.absent {
            writeln!(f, "WARNING: column {column:?} not found in dataset")?;
        }
        writeln!(f, "missing values per column ({} rows):", self.rows)?;
        let width = self.missing.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
        for (name, count) in &self.missing {
            writeln!(f, "  {name:<width$}  {count}")?;
        }
        Ok(())
    }
}

/// Apply the training-time normalization to whatever feature columns exist
/// and count what is left missing.
pub fn clean_for_inspection(df: DataFrame) -> PolarsResult<(DataFrame, Vec<&'static str>)> {
    let absent = absent_columns(&df, &HeartRecord::required_columns());
    let present: Vec<Feature> = Feature::ALL
        .iter()
        .copied()
        .filter(|f| !absent.contains(&f.column()))
        .collect();
    let cleaned = clean_features(df.lazy(), &present).collect()?;
    Ok((cleaned, absent))
}

pub fn missing_report(cleaned: &DataFrame, absent: Vec<&'static str>) -> MissingReport {
    MissingReport {
        rows: cleaned.height(),
        missing: cleaned
            .get_columns()
            .iter()
            .map(|s| (s.name().to_string(), s.null_count()))
            .collect(),
        absent,
    }
}

fn export(path: &Path, df: &mut DataFrame) -> Result<(), PipelineError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => write_csv(path, df),
        Some("parquet") => write_parquet(path, df),
        _ => Err(PipelineError::ExportFormat {
            path: path.to_path_buf(),
        }),
    }
}

pub fn run(options: &InspectOptions) -> Result<MissingReport, PipelineError> {
    let raw = read_csv(&options.dataset)?;
    println!("{}", raw.head(Some(5)));
    println!("{:#?}", raw.schema());

    let (mut cleaned, absent) = clean_for_inspection(raw)?;
    for column in &absent {
        log::warn!("column {column:?} not found in {}", options.dataset.display());
    }
    let report = missing_report(&cleaned, absent);

    if let Some(path) = &options.export {
        export(path, &mut cleaned)?;
        log::info!("wrote cleaned frame to {}", path.display());
    }
    Ok(report)
}
