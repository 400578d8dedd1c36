use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bundle::ModelBundle;
use crate::error::{PredictorError, Result};
use crate::types::{
    EncodedFeatureVector, PassengerRecord, PredictionResult, EMBARKED_FIELD, REQUIRED_FIELDS,
    SEX_FIELD,
};

/// Values substituted for missing or unusable request fields.
///
/// Fallback categories are labels, resolved through the fitted encoders, so
/// they stay correct whatever code order the encoders were fit with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationDefaults {
    pub age: f64,
    pub fare: f64,
    pub sibsp: u32,
    pub parch: u32,
    pub embarked: String,
    pub sex_fallback: String,
    pub embarked_fallback: String,
}

impl Default for ImputationDefaults {
    fn default() -> Self {
        Self {
            age: 30.0,
            fare: 32.2,
            sibsp: 0,
            parch: 0,
            embarked: "S".to_string(),
            sex_fallback: "male".to_string(),
            embarked_fallback: "S".to_string(),
        }
    }
}

/// The inference gateway: validates, imputes, encodes and classifies one
/// passenger at a time against a read-only bundle.
#[derive(Debug)]
pub struct Predictor {
    bundle: ModelBundle,
    defaults: ImputationDefaults,
    log_vectors: bool,
}

impl Predictor {
    pub fn new(bundle: ModelBundle, defaults: ImputationDefaults) -> Result<Self> {
        // A fallback outside the vocabulary would turn every unseen label
        // into a request failure; refuse to start instead.
        bundle
            .encoder(SEX_FIELD)?
            .transform(&defaults.sex_fallback)?;
        let ports = bundle.encoder(EMBARKED_FIELD)?;
        ports.transform(&defaults.embarked_fallback)?;
        ports.transform(&defaults.embarked)?;

        Ok(Self {
            bundle,
            defaults,
            log_vectors: false,
        })
    }

    pub fn load(dir: impl AsRef<Path>, defaults: ImputationDefaults) -> Result<Self> {
        let bundle = ModelBundle::load(dir)?;
        Self::new(bundle, defaults)
    }

    /// Emit one debug line per request describing the encoded vector.
    pub fn with_vector_logging(mut self, enabled: bool) -> Self {
        self.log_vectors = enabled;
        self
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn defaults(&self) -> &ImputationDefaults {
        &self.defaults
    }

    /// Full JSON path: required-field check, parsing, then `predict`.
    pub fn predict_json(&self, payload: &Value) -> Result<PredictionResult> {
        let record = parse_record(payload)?;
        self.predict(&record)
    }

    pub fn predict(&self, record: &PassengerRecord) -> Result<PredictionResult> {
        let vector = self.encode(record)?;
        if self.log_vectors {
            let sample: Vec<String> = self
                .bundle
                .feature_columns
                .iter()
                .zip(&vector)
                .map(|(name, v)| format!("{name}={v:.3}"))
                .collect();
            tracing::info!(in_dim = vector.len(), sample = %sample.join(", "), "encoded request");
        }

        let (class, p_death, p_survival) = self.bundle.classifier.predict_binary(&vector)?;
        Ok(PredictionResult::from_probabilities(
            class as u8,
            p_death,
            p_survival,
        ))
    }

    /// Imputes missing values and encodes categories, in the bundle's column order.
    pub fn encode(&self, record: &PassengerRecord) -> Result<EncodedFeatureVector> {
        let d = &self.defaults;
        let sex = self
            .bundle
            .encoder(SEX_FIELD)?
            .transform_or(record.sex.as_deref(), &d.sex_fallback)?;
        let port = record
            .embarked
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(d.embarked.as_str());
        let embarked = self
            .bundle
            .encoder(EMBARKED_FIELD)?
            .transform_or(Some(port), &d.embarked_fallback)?;

        self.bundle
            .feature_columns
            .iter()
            .map(|column| {
                Ok(match column.as_str() {
                    "pclass" => f64::from(record.pclass),
                    "sex" => f64::from(sex),
                    "age" => record.age.unwrap_or(d.age),
                    "sibsp" => f64::from(record.sibsp.unwrap_or(d.sibsp)),
                    "parch" => f64::from(record.parch.unwrap_or(d.parch)),
                    "fare" => record.fare.unwrap_or(d.fare),
                    "embarked" => f64::from(embarked),
                    other => {
                        return Err(PredictorError::Prediction(format!(
                            "unsupported feature column {other}"
                        )))
                    }
                })
            })
            .collect()
    }
}

/// Checks that every required key is present, then converts the payload.
/// Null values count as present and are left for imputation. A payload that
/// is not an object carries none of the keys.
pub fn parse_record(payload: &Value) -> Result<PassengerRecord> {
    let Some(obj) = payload.as_object() else {
        return Err(PredictorError::MissingRequiredField {
            fields: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
        });
    };

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|f| !obj.contains_key(**f))
        .map(|f| f.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PredictorError::MissingRequiredField { fields: missing });
    }

    let pclass = number(obj, "pclass")?
        .ok_or_else(|| PredictorError::invalid("pclass", "must not be null"))?;
    if pclass.fract() != 0.0 || !(1.0..=3.0).contains(&pclass) {
        return Err(PredictorError::invalid("pclass", format!("{pclass} is not one of 1, 2, 3")));
    }

    Ok(PassengerRecord {
        pclass: pclass as u8,
        sex: label(obj, "sex"),
        age: non_negative(obj, "age")?,
        sibsp: count(obj, "sibsp")?,
        parch: count(obj, "parch")?,
        fare: non_negative(obj, "fare")?,
        embarked: label(obj, "embarked"),
    })
}

/// Numbers and numeric strings are accepted; null and NaN read as absent.
fn number(obj: &Map<String, Value>, field: &str) -> Result<Option<f64>> {
    let parsed = match obj.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => Some(
            s.trim()
                .parse::<f64>()
                .map_err(|_| PredictorError::invalid(field, format!("{s:?} is not a number")))?,
        ),
        Some(other) => {
            return Err(PredictorError::invalid(field, format!("{other} is not a number")));
        }
    };
    Ok(parsed.filter(|v| !v.is_nan()))
}

fn non_negative(obj: &Map<String, Value>, field: &str) -> Result<Option<f64>> {
    match number(obj, field)? {
        Some(v) if v < 0.0 || v.is_infinite() => {
            Err(PredictorError::invalid(field, format!("{v} must be a non-negative number")))
        }
        v => Ok(v),
    }
}

fn count(obj: &Map<String, Value>, field: &str) -> Result<Option<u32>> {
    match number(obj, field)? {
        None => Ok(None),
        Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX) => Ok(Some(v as u32)),
        Some(v) => Err(PredictorError::invalid(field, format!("{v} must be a non-negative integer"))),
    }
}

fn label(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_every_missing_field() {
        let err = parse_record(&json!({"pclass": 1, "age": 3})).unwrap_err();
        match err {
            PredictorError::MissingRequiredField { fields } => {
                assert_eq!(fields, vec!["sex", "sibsp", "parch", "fare", "embarked"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nulls_are_present_but_absent_values() {
        let r = parse_record(&json!({
            "pclass": 2, "sex": null, "age": null, "sibsp": null,
            "parch": 1, "fare": null, "embarked": null
        }))
        .unwrap();
        assert_eq!(r.pclass, 2);
        assert_eq!(r.sex, None);
        assert_eq!(r.age, None);
        assert_eq!(r.sibsp, None);
        assert_eq!(r.parch, Some(1));
        assert_eq!(r.fare, None);
        assert_eq!(r.embarked, None);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let r = parse_record(&json!({
            "pclass": "3", "sex": "male", "age": "22.5", "sibsp": "1",
            "parch": 0, "fare": 7.25, "embarked": "S"
        }))
        .unwrap();
        assert_eq!(r, PassengerRecord::complete(3, "male", 22.5, 1, 0, 7.25, "S"));
    }

    #[test]
    fn bad_values_are_rejected() {
        let base = json!({
            "pclass": 1, "sex": "female", "age": 30, "sibsp": 0,
            "parch": 0, "fare": 10, "embarked": "C"
        });
        for (field, bad) in [
            ("pclass", json!(4)),
            ("pclass", json!(1.5)),
            ("pclass", json!(null)),
            ("age", json!("old")),
            ("age", json!(-1)),
            ("sibsp", json!(1.5)),
            ("fare", json!([1])),
        ] {
            let mut payload = base.clone();
            payload[field] = bad.clone();
            match parse_record(&payload) {
                Err(PredictorError::InvalidField { field: f, .. }) => assert_eq!(f, field),
                other => panic!("{field}={bad}: expected InvalidField, got {other:?}"),
            }
        }
    }

    #[test]
    fn non_object_body_misses_every_field() {
        for body in [json!([1, 2, 3]), json!("abc"), json!(7), json!(true)] {
            match parse_record(&body) {
                Err(PredictorError::MissingRequiredField { fields }) => {
                    assert_eq!(fields, REQUIRED_FIELDS.to_vec());
                }
                other => panic!("{body}: expected MissingRequiredField, got {other:?}"),
            }
        }
    }

    #[test]
    fn default_imputation_values() {
        let d = ImputationDefaults::default();
        assert_eq!(d.age, 30.0);
        assert_eq!(d.fare, 32.2);
        assert_eq!(d.embarked, "S");
        assert_eq!(d.sex_fallback, "male");
        assert_eq!(d.embarked_fallback, "S");
    }
}
