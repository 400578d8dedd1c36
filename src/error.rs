use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictorError {
    /// One or more of the required request fields were absent.
    #[error("Missing required fields: {fields:?}")]
    MissingRequiredField { fields: Vec<String> },

    /// A categorical label that the encoder never saw at fit time.
    #[error("unknown category {label:?} for field {field}")]
    UnknownCategory { field: String, label: String },

    #[error("failed to load {artifact} from {path}: {reason}")]
    ModelLoad {
        artifact: &'static str,
        path: String,
        reason: String,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("{0}")]
    Prediction(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PredictorError>;

impl PredictorError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        PredictorError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the failure is the caller's fault and maps to a 400.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictorError::MissingRequiredField { .. })
    }
}
