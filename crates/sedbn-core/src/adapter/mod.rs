//! Prediction request/response boundary.
//!
//! The adapter turns a flat map of named feature values into evidence using
//! the model's configured feature bindings, queries a fixed target variable,
//! and always answers with one of two JSON shapes:
//!
//! - `{"prediction": <state-or-distribution>}` on success
//! - `{"error": <message>}` on failure
//!
//! Internal error text never crosses this boundary; the full error is logged
//! and replaced with a generic message. Transport is left to the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::elimination::{infer_resolved, InferenceConfig};
use crate::engine::errors::BnError;
use crate::engine::evidence::ResolvedEvidence;
use crate::engine::features::FeatureValue;
use crate::engine::model::{Model, VarId};
use crate::engine::posterior::Distribution;

const MALFORMED_REQUEST: &str = "malformed request";
const INVALID_FEATURES: &str = "request contains an unknown feature or an invalid feature value";
const IMPOSSIBLE_CONDITIONS: &str = "the supplied conditions are impossible under the model";
const GENERIC_FAILURE: &str = "prediction failed";

/// How a successful prediction is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Most probable target state only.
    #[default]
    Label,
    /// Full posterior over target states.
    Distribution,
}

/// Adapter settings, as written in a model file's `[adapter]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterDef {
    pub target: String,
    #[serde(default)]
    pub response: ResponseMode,
}

/// Incoming request: feature name to raw value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionRequest {
    pub features: BTreeMap<String, FeatureValue>,
}

impl PredictionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, feature: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.features.insert(feature.into(), value.into());
        self
    }
}

/// Successful prediction payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Prediction {
    Label(String),
    Distribution(Distribution),
}

/// The only two shapes the boundary emits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Prediction { prediction: Prediction },
    Error { error: String },
}

impl PredictionResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, PredictionResponse::Error { .. })
    }

    fn error(message: impl Into<String>) -> Self {
        PredictionResponse::Error {
            error: message.into(),
        }
    }
}

/// Liveness payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub target: String,
    pub variables: usize,
    pub features: Vec<String>,
}

/// Maps external feature values to evidence and queries one target variable.
#[derive(Debug, Clone)]
pub struct QueryAdapter {
    model: Arc<Model>,
    target: VarId,
    mode: ResponseMode,
    config: InferenceConfig,
}

impl QueryAdapter {
    /// # Errors
    ///
    /// - [`BnError::UnknownVariable`] if `target` is not a model variable.
    /// - [`BnError::InvalidQuery`] if a feature binding observes the target.
    pub fn new(model: Arc<Model>, target: &str, mode: ResponseMode) -> Result<Self, BnError> {
        let target = model.id_of(target)?;
        if let Some(binding) = model.features().iter().find(|b| b.variable() == target) {
            return Err(BnError::InvalidQuery(format!(
                "feature '{}' observes the target variable '{}'",
                binding.name(),
                model.var(target).name()
            )));
        }
        Ok(Self {
            model,
            target,
            mode,
            config: InferenceConfig::default(),
        })
    }

    pub fn from_def(model: Arc<Model>, def: &AdapterDef) -> Result<Self, BnError> {
        Self::new(model, &def.target, def.response)
    }

    pub fn with_config(mut self, config: InferenceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn target(&self) -> &str {
        self.model.var(self.target).name()
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    /// Translates a request into evidence. Features bound with a default are
    /// observed even when omitted; other omitted features stay unobserved.
    pub fn evidence_for(&self, request: &PredictionRequest) -> Result<ResolvedEvidence, BnError> {
        let features = self.model.features();
        if let Some(unknown) = request.features.keys().find(|k| features.get(k.as_str()).is_none()) {
            return Err(BnError::Feature(format!("unknown feature '{}'", unknown)));
        }

        let mut observed: Vec<(VarId, usize)> = Vec::with_capacity(features.len());
        for binding in features.iter() {
            let value = match request.features.get(binding.name()) {
                Some(value) => value,
                None => match binding.default_value() {
                    Some(default) => default,
                    None => continue,
                },
            };
            let state = binding.map_value(&self.model, value)?;
            if let Some((_, previous)) = observed.iter().find(|(v, _)| *v == binding.variable()) {
                if *previous != state {
                    return Err(BnError::Feature(format!(
                        "feature '{}' disagrees with another feature bound to the same variable",
                        binding.name()
                    )));
                }
                continue;
            }
            observed.push((binding.variable(), state));
        }
        Ok(ResolvedEvidence::from_pairs(observed))
    }

    /// Runs the target query, surfacing internal errors unchanged.
    pub fn posterior(&self, request: &PredictionRequest) -> Result<Distribution, BnError> {
        let evidence = self.evidence_for(request)?;
        let (result, _) = infer_resolved(&self.model, &evidence, &[self.target], self.config)?;
        result
            .get(self.target())
            .cloned()
            .ok_or_else(|| BnError::Internal("target missing from posterior".into()))
    }

    /// Serves one request. Never fails: errors become an error payload.
    pub fn predict(&self, request: &PredictionRequest) -> PredictionResponse {
        match self.posterior(request) {
            Ok(distribution) => {
                let prediction = match self.mode {
                    ResponseMode::Label => {
                        Prediction::Label(distribution.most_probable().0.to_string())
                    }
                    ResponseMode::Distribution => Prediction::Distribution(distribution),
                };
                PredictionResponse::Prediction { prediction }
            }
            Err(err) => {
                tracing::warn!(kind = err.kind(), error = %err, "prediction request failed");
                PredictionResponse::error(public_message(&err))
            }
        }
    }

    /// Serves one raw JSON request body and returns a JSON response body.
    pub fn predict_json(&self, body: &str) -> String {
        let response = match serde_json::from_str::<PredictionRequest>(body) {
            Ok(request) => self.predict(&request),
            Err(err) => {
                tracing::warn!(error = %err, "malformed prediction request");
                PredictionResponse::error(MALFORMED_REQUEST)
            }
        };
        serde_json::to_string(&response)
            .unwrap_or_else(|_| format!("{{\"error\":\"{}\"}}", GENERIC_FAILURE))
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            status: "ok",
            model_loaded: true,
            target: self.target().to_string(),
            variables: self.model.len(),
            features: self
                .model
                .features()
                .iter()
                .map(|b| b.name().to_string())
                .collect(),
        }
    }
}

/// Client-safe message for an error. Detail stays in the log.
fn public_message(err: &BnError) -> &'static str {
    match err {
        BnError::Feature(_) => INVALID_FEATURES,
        BnError::InconsistentEvidence(_) => IMPOSSIBLE_CONDITIONS,
        _ => GENERIC_FAILURE,
    }
}
