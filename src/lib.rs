//! Titanic survival prediction: a seeded synthetic-data training run that
//! persists a random-forest bundle, and an HTTP gateway serving it.

pub mod bundle;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod forest;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod server;
pub mod synth;
pub mod train;
pub mod types;

pub use bundle::ModelBundle;
pub use error::{PredictorError, Result};
pub use model::{ImputationDefaults, Predictor};
pub use types::{PassengerRecord, PredictionResult};
