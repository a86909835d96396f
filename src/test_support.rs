//! Synthetic datasets shaped like the UCI heart-disease CSV.

use std::path::Path;

const HEADER: [&str; 16] = [
    "id", "age", "sex", "dataset", "cp", "trestbps", "chol", "fbs", "restecg", "thalch", "exang",
    "oldpeak", "slope", "ca", "thal", "num",
];

/// Write `rows` records to `path`, leaving out the columns named in `omit`.
/// Labels, `TRUE`/`FALSE` flags, `?` placeholders and blanks all appear.
pub fn write_dataset(path: &Path, rows: usize, omit: &[&str]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    let keep: Vec<usize> = (0..HEADER.len())
        .filter(|i| !omit.contains(&HEADER[*i]))
        .collect();
    writer
        .write_record(keep.iter().map(|i| HEADER[*i]))
        .unwrap();
    for i in 0..rows {
        let record = record(i);
        writer
            .write_record(keep.iter().map(|k| record[*k].as_str()))
            .unwrap();
    }
    writer.flush().unwrap();
}

fn record(i: usize) -> Vec<String> {
    let positive = (i * 7) % 5 < 2;
    let pick = |options: [&str; 3]| options[i % 3].to_string();
    vec![
        (i + 1).to_string(),
        (if positive { 55 + i % 15 } else { 40 + i % 12 }).to_string(),
        (if i % 4 == 0 { "Female" } else { "Male" }).to_string(),
        "Cleveland".to_string(),
        if positive {
            (if i % 3 == 0 { "non-anginal" } else { "asymptomatic" }).to_string()
        } else {
            pick(["typical angina", "atypical angina", "non-anginal"])
        },
        (120 + i % 30).to_string(),
        if i % 11 == 0 { "?".to_string() } else { (180 + (i * 13) % 120).to_string() },
        (if i % 6 == 0 { "TRUE" } else { "FALSE" }).to_string(),
        pick(["normal", "lv hypertrophy", "st-t wave abnormality"]),
        (if positive { 110 + i % 30 } else { 150 + i % 30 }).to_string(),
        (if positive { "TRUE" } else { "FALSE" }).to_string(),
        if positive { format!("{:.1}", 1.0 + (i % 20) as f64 / 10.0) } else { "0.0".to_string() },
        pick(["upsloping", "flat", "downsloping"]),
        if i % 5 == 0 { String::new() } else { (i % 4).to_string() },
        if positive {
            "reversable defect".to_string()
        } else if i % 7 == 0 {
            "?".to_string()
        } else {
            "normal".to_string()
        },
        (if positive { 1 + i % 4 } else { 0 }).to_string(),
    ]
}
