use std::sync::Arc;

use sedbn_core::adapter::{Prediction, StatusResponse};
use sedbn_core::{FeatureDef, PredictionRequest, PredictionResponse, QueryAdapter, ResponseMode};

use crate::common::{certain_exposure, sediment_model};

fn adapter(mode: ResponseMode) -> QueryAdapter {
    let loaded = sediment_model();
    let def = loaded.adapter.clone().expect("bundled model declares an adapter");
    QueryAdapter::new(Arc::new(loaded.model), &def.target, mode).unwrap()
}

fn label(response: PredictionResponse) -> String {
    match response {
        PredictionResponse::Prediction {
            prediction: Prediction::Label(label),
        } => label,
        other => panic!("expected a label, got {:?}", other),
    }
}

#[test]
fn high_risk_sensitive_site_predicts_severe() {
    let adapter = adapter(ResponseMode::Label);
    let request = PredictionRequest::new()
        .with("contaminant", "High")
        .with("toc", 0.5)
        .with("community", "Sensitive");
    assert_eq!(label(adapter.predict(&request)), "Severe");
}

#[test]
fn robust_community_predicts_moderate() {
    let adapter = adapter(ResponseMode::Label);
    let body = adapter.predict_json(r#"{"contaminant": "high", "toc": 0.2, "community": "robust"}"#);
    assert_eq!(body, r#"{"prediction":"Moderate"}"#);
}

#[test]
fn distribution_mode_returns_all_target_states() {
    let adapter = adapter(ResponseMode::Distribution);
    let body = adapter.predict_json(r#"{"contaminant": "High", "toc": "Low", "community": "Sensitive"}"#);
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    let prediction = value["prediction"].as_object().unwrap();
    let keys: Vec<&str> = prediction.keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 3);
    assert!((prediction["Severe"].as_f64().unwrap() - 0.435).abs() < 1e-9);
    assert!((prediction["None"].as_f64().unwrap() - 0.245).abs() < 1e-9);
}

#[test]
fn toc_threshold_is_half_open() {
    let adapter = adapter(ResponseMode::Distribution);
    let at = adapter
        .posterior(&PredictionRequest::new().with("contaminant", "High").with("toc", 1.0))
        .unwrap();
    let high = adapter
        .posterior(&PredictionRequest::new().with("contaminant", "High").with("toc", "High"))
        .unwrap();
    let below = adapter
        .posterior(&PredictionRequest::new().with("contaminant", "High").with("toc", 0.999))
        .unwrap();
    assert_eq!(at, high);
    assert_ne!(at, below);
}

#[test]
fn omitted_contaminant_falls_back_to_default() {
    let adapter = adapter(ResponseMode::Distribution);
    let omitted = adapter.posterior(&PredictionRequest::new()).unwrap();
    let explicit = adapter
        .posterior(&PredictionRequest::new().with("contaminant", "Low"))
        .unwrap();
    assert_eq!(omitted, explicit);
}

#[test]
fn bad_requests_produce_error_payloads() {
    let adapter = adapter(ResponseMode::Label);

    let unknown: serde_json::Value =
        serde_json::from_str(&adapter.predict_json(r#"{"salinity": 30}"#)).unwrap();
    let message = unknown["error"].as_str().unwrap();
    assert!(!message.contains("salinity"));
    assert!(unknown.get("prediction").is_none());

    let bad_label: serde_json::Value =
        serde_json::from_str(&adapter.predict_json(r#"{"contaminant": "Extreme"}"#)).unwrap();
    assert_eq!(bad_label["error"].as_str().unwrap(), message);

    let numeric_without_bins: serde_json::Value =
        serde_json::from_str(&adapter.predict_json(r#"{"grain_size": 0.3}"#)).unwrap();
    assert!(numeric_without_bins["error"].is_string());

    assert_eq!(adapter.predict_json("[1, 2"), r#"{"error":"malformed request"}"#);
    assert!(adapter.predict(&PredictionRequest::new().with("foo", 1.0)).is_error());
}

#[test]
fn status_payload() {
    let adapter = adapter(ResponseMode::Label);
    let status: StatusResponse = adapter.status();
    assert_eq!(status.status, "ok");
    assert!(status.model_loaded);
    assert_eq!(status.target, "Ecological_Effect");
    assert_eq!(status.variables, 8);
    assert_eq!(status.features, vec!["contaminant", "toc", "grain_size", "community"]);
}

#[test]
fn impossible_conditions_get_a_generic_error() {
    let model = certain_exposure()
        .with_features(vec![FeatureDef::new("contaminant", "Contaminant")])
        .unwrap();
    let adapter = QueryAdapter::new(Arc::new(model), "Effect", ResponseMode::Distribution).unwrap();

    assert_eq!(
        adapter.predict_json(r#"{"contaminant": "High"}"#),
        r#"{"error":"the supplied conditions are impossible under the model"}"#
    );
    let possible: serde_json::Value =
        serde_json::from_str(&adapter.predict_json(r#"{"contaminant": "Low"}"#)).unwrap();
    assert_eq!(possible["prediction"]["None"].as_f64(), Some(1.0));
}
