use crate::features::Feature;

/// Severity column the binary target is derived from.
pub const TARGET_COLUMN: &str = "num";

pub struct HeartRecord {}

impl HeartRecord {
    /// Columns training cannot run without, in model order followed by the target.
    pub fn required_columns() -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = Feature::ALL.iter().map(|f| f.column()).collect();
        columns.push(TARGET_COLUMN);
        columns
    }

    /// Severity 1-4 means disease, 0 means none. `None` when the cell holds
    /// no number.
    pub fn label_from_severity(cell: Option<&str>) -> Option<i32> {
        cell.and_then(|c| c.trim().parse::<f64>().ok())
            .filter(|severity| !severity.is_nan())
            .map(|severity| i32::from(severity > 0.0))
    }
}
