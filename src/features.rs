//! The feature-normalization contract.
//!
//! Training and inference both turn raw values into model inputs through
//! [`normalize`]. Column order, category codes and placeholder handling live
//! here and nowhere else, so the two paths cannot drift apart.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_json::{Map, Value};

use crate::error::PredictError;

/// Number of model inputs.
pub const N_FEATURES: usize = 13;

/// Bumped whenever a category code or the column order changes. Persisted in
/// every artifact and checked at load time.
pub const ENCODING_VERSION: u32 = 1;

/// Marker the source dataset uses for unknown values.
pub const PLACEHOLDER: &str = "?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feature {
    Age,
    Sex,
    ChestPain,
    RestingBloodPressure,
    Cholesterol,
    FastingBloodSugar,
    RestEcg,
    MaxHeartRate,
    ExerciseAngina,
    StDepression,
    Slope,
    MajorVessels,
    Thal,
}

/// How raw values of a column are turned into numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Numeric,
    Categorical,
    Boolean,
}

impl Feature {
    /// Model column order.
    pub const ALL: [Feature; N_FEATURES] = [
        Feature::Age,
        Feature::Sex,
        Feature::ChestPain,
        Feature::RestingBloodPressure,
        Feature::Cholesterol,
        Feature::FastingBloodSugar,
        Feature::RestEcg,
        Feature::MaxHeartRate,
        Feature::ExerciseAngina,
        Feature::StDepression,
        Feature::Slope,
        Feature::MajorVessels,
        Feature::Thal,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Feature::Age => "age",
            Feature::Sex => "sex",
            Feature::ChestPain => "cp",
            Feature::RestingBloodPressure => "trestbps",
            Feature::Cholesterol => "chol",
            Feature::FastingBloodSugar => "fbs",
            Feature::RestEcg => "restecg",
            Feature::MaxHeartRate => "thalch",
            Feature::ExerciseAngina => "exang",
            Feature::StDepression => "oldpeak",
            Feature::Slope => "slope",
            Feature::MajorVessels => "ca",
            Feature::Thal => "thal",
        }
    }

    /// Alternative request keys. The web form spells max heart rate `thalach`.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Feature::MaxHeartRate => &["thalach"],
            _ => &[],
        }
    }

    pub fn index(self) -> usize {
        Feature::ALL
            .iter()
            .position(|f| *f == self)
            .unwrap_or_default()
    }

    pub fn kind(self) -> Kind {
        match self {
            Feature::Sex
            | Feature::ChestPain
            | Feature::RestEcg
            | Feature::Slope
            | Feature::Thal => Kind::Categorical,
            Feature::FastingBloodSugar | Feature::ExerciseAngina => Kind::Boolean,
            _ => Kind::Numeric,
        }
    }

    pub fn from_column(name: &str) -> Option<Feature> {
        COLUMN_LOOKUP.get(name).copied()
    }

    /// Label → code table for categorical and boolean columns.
    pub fn codes(self) -> Option<&'static HashMap<&'static str, f64>> {
        CATEGORY_CODES.get(&self)
    }
}

lazy_static! {
    static ref CATEGORY_CODES: HashMap<Feature, HashMap<&'static str, f64>> = {
        let boolean = HashMap::from([("true", 1.0), ("false", 0.0)]);
        HashMap::from([
            (Feature::Sex, HashMap::from([("male", 1.0), ("female", 0.0)])),
            (
                Feature::ChestPain,
                HashMap::from([
                    ("typical angina", 0.0),
                    ("atypical angina", 1.0),
                    ("non-anginal", 2.0),
                    ("asymptomatic", 3.0),
                ]),
            ),
            (Feature::FastingBloodSugar, boolean.clone()),
            (
                Feature::RestEcg,
                HashMap::from([
                    ("normal", 0.0),
                    ("st-t wave abnormality", 1.0),
                    ("lv hypertrophy", 2.0),
                ]),
            ),
            (Feature::ExerciseAngina, boolean),
            (
                Feature::Slope,
                HashMap::from([("upsloping", 0.0), ("flat", 1.0), ("downsloping", 2.0)]),
            ),
            (
                Feature::Thal,
                HashMap::from([
                    ("normal", 1.0),
                    ("fixed defect", 2.0),
                    ("reversable defect", 3.0),
                ]),
            ),
        ])
    };
    static ref COLUMN_LOOKUP: HashMap<&'static str, Feature> = Feature::ALL
        .iter()
        .flat_map(|f| {
            let f = *f;
            std::iter::once((f.column(), f)).chain(f.aliases().iter().map(move |a| (*a, f)))
        })
        .collect();
}

/// A value as it arrives from a CSV cell or a JSON request field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawValue<'a> {
    Missing,
    Bool(bool),
    Number(f64),
    Text(&'a str),
}

impl<'a> From<&'a Value> for RawValue<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => RawValue::Missing,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Missing),
            Value::String(s) => RawValue::Text(s),
            Value::Array(_) | Value::Object(_) => RawValue::Missing,
        }
    }
}

impl<'a> From<Option<&'a str>> for RawValue<'a> {
    fn from(cell: Option<&'a str>) -> Self {
        cell.map(RawValue::Text).unwrap_or(RawValue::Missing)
    }
}

/// Map one raw value of `feature` to its model input. `None` means missing:
/// placeholders, unknown labels, out-of-table codes and anything that fails
/// numeric coercion all end up here instead of raising.
pub fn normalize(feature: Feature, raw: RawValue<'_>) -> Option<f64> {
    match raw {
        RawValue::Missing => None,
        RawValue::Bool(flag) => match feature.kind() {
            Kind::Boolean => Some(if flag { 1.0 } else { 0.0 }),
            _ => None,
        },
        RawValue::Number(value) => coded(feature, value),
        RawValue::Text(text) => {
            let text = text.trim();
            if text.is_empty() || text == PLACEHOLDER {
                return None;
            }
            if let Some(codes) = feature.codes() {
                if let Some(code) = codes.get(text.to_lowercase().as_str()) {
                    return Some(*code);
                }
            }
            text.parse::<f64>().ok().and_then(|value| coded(feature, value))
        }
    }
}

fn coded(feature: Feature, value: f64) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    match feature.codes() {
        Some(codes) if !codes.values().any(|code| *code == value) => None,
        _ => Some(value),
    }
}

/// One record in model column order, missing entries not yet imputed.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector {
    values: [Option<f64>; N_FEATURES],
}

impl FeatureVector {
    /// Build a vector from a request body. Keys are matched by name, so their
    /// order in the payload is irrelevant. Unknown keys are ignored.
    pub fn from_json(payload: &Value) -> Result<Self, PredictError> {
        let object = payload.as_object().ok_or_else(|| {
            PredictError::InvalidPayload(format!(
                "expected a JSON object keyed by feature name, got {}",
                json_kind(payload)
            ))
        })?;
        Ok(Self::from_object(object))
    }

    pub fn from_object(object: &Map<String, Value>) -> Self {
        let mut values = [None; N_FEATURES];
        for feature in Feature::ALL {
            let raw = std::iter::once(feature.column())
                .chain(feature.aliases().iter().copied())
                .find_map(|key| object.get(key))
                .map(RawValue::from)
                .unwrap_or(RawValue::Missing);
            let value = normalize(feature, raw);
            if value.is_none() && raw != RawValue::Missing {
                log::debug!("{} value {:?} could not be mapped, treating as missing", feature.column(), raw);
            }
            values[feature.index()] = value;
        }
        for key in object.keys() {
            if Feature::from_column(key).is_none() {
                log::debug!("ignoring unknown field {key:?}");
            }
        }
        Self { values }
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values[feature.index()]
    }

    pub fn missing(&self) -> Vec<Feature> {
        Feature::ALL
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    /// Dense row with NaN marking missing values, the form the imputer expects.
    pub fn to_row(&self) -> [f64; N_FEATURES] {
        self.values.map(|v| v.unwrap_or(f64::NAN))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
