use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{rejection::FormRejection, rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::error::{PredictorError, Result};
use crate::model::{ImputationDefaults, Predictor};
use crate::types::{PassengerRecord, PredictionResult};

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    predictor: Arc<Predictor>,
}

pub fn router(predictor: Arc<Predictor>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/predict_form", post(predict_form))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::new())
        .with_state(AppState { predictor })
}

async fn home() -> Json<Value> {
    Json(json!({
        "message": "Titanic Survival Prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "predict": "/predict (POST)",
            "predict_form": "/predict_form (POST)",
            "health": "/health (GET)"
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let loaded = !state.predictor.bundle().classifier.trees().is_empty();
    Json(json!({ "status": "healthy", "model_loaded": loaded }))
}

async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> std::result::Result<Json<PredictionResult>, ApiError> {
    let payload = match payload {
        Ok(Json(v)) if !is_empty_payload(&v) => v,
        Ok(_) => return Err(no_json()),
        Err(rejection) => {
            tracing::debug!(%rejection, "rejected prediction body");
            return Err(no_json());
        }
    };

    state.predictor.predict_json(&payload).map(Json).map_err(|e| {
        if let PredictorError::MissingRequiredField { fields } = &e {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string(), "missing_fields": fields })),
            );
        }
        tracing::warn!(error = %e, "prediction failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Prediction failed: {e}") })),
        )
    })
}

async fn predict_form(
    State(state): State<AppState>,
    form: std::result::Result<Form<HashMap<String, String>>, FormRejection>,
) -> std::result::Result<Json<PredictionResult>, ApiError> {
    let record = form
        .map_err(|rejection| PredictorError::invalid("form", rejection.body_text()))
        .and_then(|Form(fields)| record_from_form(&fields, state.predictor.defaults()))
        .map_err(|e| {
            tracing::warn!(error = %e, "form rejected");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Form processing error: {e}") })),
            )
        })?;

    state.predictor.predict(&record).map(Json).map_err(|e| {
        tracing::warn!(error = %e, "prediction failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("Prediction failed: {e}") })),
        )
    })
}

/// Absent form keys take the built-in defaults; present keys must parse.
pub fn record_from_form(
    fields: &HashMap<String, String>,
    defaults: &ImputationDefaults,
) -> Result<PassengerRecord> {
    fn parse<T: std::str::FromStr>(
        fields: &HashMap<String, String>,
        key: &str,
        default: T,
    ) -> Result<T> {
        match fields.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| PredictorError::invalid(key, format!("cannot parse {raw:?}"))),
        }
    }

    let pclass: u8 = parse(fields, "pclass", 3)?;
    if !(1..=3).contains(&pclass) {
        return Err(PredictorError::invalid("pclass", format!("{pclass} is not one of 1, 2, 3")));
    }
    let age: f64 = parse(fields, "age", defaults.age)?;
    let fare: f64 = parse(fields, "fare", defaults.fare)?;
    for (key, v) in [("age", age), ("fare", fare)] {
        if !v.is_finite() || v < 0.0 {
            return Err(PredictorError::invalid(key, format!("{v} must be a non-negative number")));
        }
    }

    Ok(PassengerRecord {
        pclass,
        sex: Some(fields.get("sex").cloned().unwrap_or_else(|| "male".to_string())),
        age: Some(age),
        sibsp: Some(parse(fields, "sibsp", defaults.sibsp)?),
        parch: Some(parse(fields, "parch", defaults.parch)?),
        fare: Some(fare),
        embarked: Some(fields.get("embarked").cloned().unwrap_or_else(|| "S".to_string())),
    })
}

/// Falsy JSON: null, false, zero, and empty strings, arrays and objects.
fn is_empty_payload(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn no_json() -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "No JSON data provided" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_form_takes_defaults() {
        let r = record_from_form(&form(&[]), &ImputationDefaults::default()).unwrap();
        assert_eq!(r, PassengerRecord::complete(3, "male", 30.0, 0, 0, 32.2, "S"));
    }

    #[test]
    fn form_values_are_parsed() {
        let r = record_from_form(
            &form(&[
                ("pclass", "1"),
                ("sex", "female"),
                ("age", " 4.5 "),
                ("sibsp", "2"),
                ("parch", "1"),
                ("fare", "120"),
                ("embarked", "C"),
            ]),
            &ImputationDefaults::default(),
        )
        .unwrap();
        assert_eq!(r, PassengerRecord::complete(1, "female", 4.5, 2, 1, 120.0, "C"));
    }

    #[test]
    fn unparseable_form_values_fail() {
        let d = ImputationDefaults::default();
        assert!(record_from_form(&form(&[("age", "old")]), &d).is_err());
        assert!(record_from_form(&form(&[("pclass", "7")]), &d).is_err());
        assert!(record_from_form(&form(&[("sibsp", "-1")]), &d).is_err());
        assert!(record_from_form(&form(&[("fare", "-3")]), &d).is_err());
    }

    #[test]
    fn empty_payload_detection() {
        assert!(is_empty_payload(&Value::Null));
        assert!(is_empty_payload(&json!({})));
        assert!(is_empty_payload(&json!([])));
        assert!(is_empty_payload(&json!(false)));
        assert!(is_empty_payload(&json!(0)));
        assert!(is_empty_payload(&json!(0.0)));
        assert!(is_empty_payload(&json!("")));
        assert!(!is_empty_payload(&json!({"pclass": 1})));
        assert!(!is_empty_payload(&json!([1, 2])));
        assert!(!is_empty_payload(&json!("abc")));
        assert!(!is_empty_payload(&json!(true)));
    }
}
