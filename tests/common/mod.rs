#![allow(dead_code)]

use titanic_predictor::{
    config::TrainConfig,
    forest::ForestParams,
    train::{train, TrainedModel},
    ImputationDefaults, Predictor,
};

pub fn quick_config() -> TrainConfig {
    TrainConfig {
        n_samples: 400,
        forest: ForestParams {
            n_estimators: 20,
            ..ForestParams::default()
        },
        ..TrainConfig::default()
    }
}

pub fn quick_model() -> TrainedModel {
    train(&quick_config()).expect("training should succeed")
}

pub fn quick_predictor() -> Predictor {
    Predictor::new(quick_model().bundle, ImputationDefaults::default())
        .expect("bundle should be servable")
}
