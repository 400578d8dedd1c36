use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::encoder::CategoryEncoder;
use crate::error::{PredictorError, Result};
use crate::forest::RandomForest;
use crate::types::{EMBARKED_FIELD, SEX_FIELD};

pub const MODEL_FILE: &str = "titanic_model.json";
pub const ENCODERS_FILE: &str = "label_encoders.json";
pub const COLUMNS_FILE: &str = "feature_columns.json";

/// Everything a serving process needs, produced by one training run and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub classifier: RandomForest,
    pub encoders: BTreeMap<String, CategoryEncoder>,
    pub feature_columns: Vec<String>,
}

impl ModelBundle {
    pub fn new(
        classifier: RandomForest,
        encoders: BTreeMap<String, CategoryEncoder>,
        feature_columns: Vec<String>,
    ) -> Result<Self> {
        let bundle = Self {
            classifier,
            encoders,
            feature_columns,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn encoder(&self, field: &str) -> Result<&CategoryEncoder> {
        self.encoders
            .get(field)
            .ok_or_else(|| PredictorError::Prediction(format!("no encoder for {field}")))
    }

    /// Writes the three artifacts into `dir`, creating it if needed.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        write_json(&dir.join(MODEL_FILE), &self.classifier)?;
        write_json(&dir.join(ENCODERS_FILE), &self.encoders)?;
        write_json(&dir.join(COLUMNS_FILE), &self.feature_columns)?;
        tracing::info!(dir = %dir.display(), "model bundle saved");
        Ok(())
    }

    /// Reads all three artifacts; any one missing or malformed fails the load.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let classifier: RandomForest = read_json(dir.join(MODEL_FILE), "classifier")?;
        classifier
            .check_shape()
            .map_err(|e| PredictorError::ModelLoad {
                artifact: "classifier",
                path: dir.join(MODEL_FILE).display().to_string(),
                reason: e.to_string(),
            })?;
        let encoders: BTreeMap<String, CategoryEncoder> =
            read_json(dir.join(ENCODERS_FILE), "label encoders")?;
        let feature_columns: Vec<String> = read_json(dir.join(COLUMNS_FILE), "feature columns")?;

        let bundle = Self {
            classifier,
            encoders,
            feature_columns,
        };
        bundle.validate().map_err(|e| PredictorError::ModelLoad {
            artifact: "bundle",
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(bundle)
    }

    fn validate(&self) -> Result<()> {
        self.classifier.check_shape()?;
        if self.feature_columns.len() != self.classifier.n_features() {
            return Err(PredictorError::Prediction(format!(
                "{} feature columns but classifier expects {}",
                self.feature_columns.len(),
                self.classifier.n_features()
            )));
        }
        for field in [SEX_FIELD, EMBARKED_FIELD] {
            if !self.encoders.contains_key(field) {
                return Err(PredictorError::Prediction(format!("missing encoder for {field}")));
            }
            if !self.feature_columns.iter().any(|c| c == field) {
                return Err(PredictorError::Prediction(format!("{field} is not a feature column")));
            }
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string(value)?;
    fs::write(path, text)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: PathBuf, artifact: &'static str) -> Result<T> {
    let load_err = |reason: String| PredictorError::ModelLoad {
        artifact,
        path: path.display().to_string(),
        reason,
    };
    let text = fs::read_to_string(&path).map_err(|e| load_err(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| load_err(e.to_string()))
}
