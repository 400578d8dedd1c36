use std::collections::BTreeMap;

use serde::Serialize;

use crate::bundle::ModelBundle;
use crate::config::TrainConfig;
use crate::dataset::{stratified_split, Dataset, PassengerRow};
use crate::encoder::CategoryEncoder;
use crate::error::{PredictorError, Result};
use crate::forest::{ForestParams, RandomForest};
use crate::metrics::ClassificationReport;
use crate::synth::Synthesizer;
use crate::types::{PassengerRecord, EMBARKED_FIELD, FEATURE_COLUMNS, SEX_FIELD};

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub n_train: usize,
    pub n_test: usize,
    pub accuracy: f64,
    pub classification: ClassificationReport,
    /// `(column, importance)`, most important first.
    pub feature_importance: Vec<(String, f64)>,
}

/// Output of one training run: the bundle to persist plus its evaluation.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub bundle: ModelBundle,
    pub report: TrainingReport,
}

impl TrainedModel {
    /// `(survival_probability, prediction)` for a complete record. Unlike the
    /// serving path, labels outside the training vocabulary are an error.
    pub fn predict_survival(&self, record: &PassengerRecord) -> Result<(f64, u8)> {
        let sex = self.bundle.encoder(SEX_FIELD)?;
        let ports = self.bundle.encoder(EMBARKED_FIELD)?;
        let required = |v: Option<f64>, field: &str| {
            v.ok_or_else(|| PredictorError::invalid(field, "required for training-side prediction"))
        };
        let row = PassengerRow {
            pclass: record.pclass,
            sex: record.sex.clone().unwrap_or_default(),
            age: Some(required(record.age, "age")?),
            sibsp: record.sibsp.unwrap_or(0),
            parch: record.parch.unwrap_or(0),
            fare: Some(required(record.fare, "fare")?),
            embarked: record.embarked.clone(),
            survived: 0,
        };
        let x = encode_row(&row, sex, ports)?;
        let (class, _, p_survival) = self.bundle.classifier.predict_binary(&x)?;
        Ok((p_survival, class as u8))
    }
}

/// Synthesizes a dataset from `cfg` and trains on it.
pub fn train(cfg: &TrainConfig) -> Result<TrainedModel> {
    tracing::info!(n_samples = cfg.n_samples, seed = cfg.seed, "creating synthetic dataset");
    let dataset = Synthesizer::with_weights(cfg.seed, cfg.weights).generate(cfg.n_samples)?;
    train_on(cfg, dataset)
}

pub fn train_on(cfg: &TrainConfig, mut dataset: Dataset) -> Result<TrainedModel> {
    if dataset.is_empty() {
        return Err(PredictorError::Training("dataset has no rows".into()));
    }
    dataset.fill_missing();

    let sex = CategoryEncoder::fit(SEX_FIELD, dataset.rows.iter().map(|r| r.sex.as_str()))?;
    let ports = CategoryEncoder::fit(
        EMBARKED_FIELD,
        dataset.rows.iter().filter_map(|r| r.embarked.as_deref()),
    )?;

    let x: Vec<Vec<f64>> = dataset
        .rows
        .iter()
        .map(|r| encode_row(r, &sex, &ports))
        .collect::<Result<_>>()?;
    let y = dataset.labels();
    if y.iter().all(|&l| l == y[0]) {
        return Err(PredictorError::Training(
            "dataset contains a single class; nothing to learn".into(),
        ));
    }

    let (train_idx, test_idx) = stratified_split(&y, cfg.test_fraction, cfg.seed)?;
    let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<usize>) {
        (
            idx.iter().map(|&i| x[i].clone()).collect(),
            idx.iter().map(|&i| y[i]).collect(),
        )
    };
    let (x_train, y_train) = pick(&train_idx);
    let (x_test, y_test) = pick(&test_idx);
    tracing::info!(train = x_train.len(), test = x_test.len(), "stratified split");

    tracing::info!(
        n_estimators = cfg.forest.n_estimators,
        max_depth = ?cfg.forest.max_depth,
        "training random forest"
    );
    // The run seed owns the forest seed, whatever the config file said.
    let params = ForestParams {
        seed: cfg.seed,
        ..cfg.forest
    };
    let forest = RandomForest::fit(params, &x_train, &y_train)?;

    let y_pred = forest.predict_many(&x_test)?;
    let classification = ClassificationReport::new(&y_test, &y_pred, forest.n_classes());
    let accuracy = classification.accuracy;

    let mut feature_importance: Vec<(String, f64)> = FEATURE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .zip(forest.feature_importances())
        .collect();
    feature_importance.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut encoders = BTreeMap::new();
    encoders.insert(SEX_FIELD.to_string(), sex);
    encoders.insert(EMBARKED_FIELD.to_string(), ports);
    let columns = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
    let bundle = ModelBundle::new(forest, encoders, columns)?;

    Ok(TrainedModel {
        bundle,
        report: TrainingReport {
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            accuracy,
            classification,
            feature_importance,
        },
    })
}

/// Strict encoding used at fit time: every label must be in the vocabulary.
fn encode_row(
    row: &PassengerRow,
    sex: &CategoryEncoder,
    ports: &CategoryEncoder,
) -> Result<Vec<f64>> {
    let missing = |field: &str| PredictorError::invalid(field, "missing after imputation");
    let port = row.embarked.as_deref().ok_or_else(|| missing("embarked"))?;
    Ok(vec![
        f64::from(row.pclass),
        f64::from(sex.transform(&row.sex)?),
        row.age.ok_or_else(|| missing("age"))?,
        f64::from(row.sibsp),
        f64::from(row.parch),
        row.fare.ok_or_else(|| missing("fare"))?,
        f64::from(ports.transform(port)?),
    ])
}
