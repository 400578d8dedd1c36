use serde::{Deserialize, Serialize};

/// Feature columns in the order the classifier was trained on.
pub const FEATURE_COLUMNS: [&str; 7] = ["pclass", "sex", "age", "sibsp", "parch", "fare", "embarked"];

/// Fields a JSON prediction request must carry (null counts as present).
pub const REQUIRED_FIELDS: [&str; 7] = FEATURE_COLUMNS;

pub const SEX_FIELD: &str = "sex";
pub const EMBARKED_FIELD: &str = "embarked";

/// One passenger as received by the gateway, after JSON/form parsing but
/// before imputation. Optional fields may have arrived as null.
#[derive(Debug, Clone, PartialEq)]
pub struct PassengerRecord {
    pub pclass: u8,
    pub sex: Option<String>,
    pub age: Option<f64>,
    pub sibsp: Option<u32>,
    pub parch: Option<u32>,
    pub fare: Option<f64>,
    pub embarked: Option<String>,
}

impl PassengerRecord {
    pub fn complete(
        pclass: u8,
        sex: &str,
        age: f64,
        sibsp: u32,
        parch: u32,
        fare: f64,
        embarked: &str,
    ) -> Self {
        Self {
            pclass,
            sex: Some(sex.to_string()),
            age: Some(age),
            sibsp: Some(sibsp),
            parch: Some(parch),
            fare: Some(fare),
            embarked: Some(embarked.to_string()),
        }
    }
}

/// Fixed-order numeric row fed to the classifier.
pub type EncodedFeatureVector = Vec<f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: u8,
    pub survival_probability: f64,
    pub death_probability: f64,
    pub prediction_text: String,
    pub confidence: f64,
}

impl PredictionResult {
    /// Builds the response from the classifier's `(p_death, p_survival)` pair.
    pub fn from_probabilities(prediction: u8, p_death: f64, p_survival: f64) -> Self {
        let prediction_text = if prediction == 1 {
            "Survived"
        } else {
            "Did not survive"
        };
        Self {
            prediction,
            survival_probability: p_survival,
            death_probability: p_death,
            prediction_text: prediction_text.to_string(),
            confidence: p_survival.max(p_death),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_follows_prediction() {
        let r = PredictionResult::from_probabilities(1, 0.3, 0.7);
        assert_eq!(r.prediction_text, "Survived");
        assert!((r.confidence - 0.7).abs() < 1e-12);

        let r = PredictionResult::from_probabilities(0, 0.55, 0.45);
        assert_eq!(r.prediction_text, "Did not survive");
        assert!((r.confidence - 0.55).abs() < 1e-12);
    }
}
