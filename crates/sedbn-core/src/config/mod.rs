//! Model and scenario definition files.
//!
//! Files are TOML unless the path ends in `.json`. Loading happens once at
//! startup; a definition that fails to parse or build is fatal for that model.
//!
//! ```toml
//! [[variable]]
//! name = "TOC"
//! states = ["Low", "High"]
//! unit = "% dry weight"
//!
//! [[factor]]
//! child = "TOC"
//! prior = [0.5, 0.5]
//!
//! [[feature]]
//! name = "toc"
//! variable = "TOC"
//! bins = [{ state = "Low", below = 1.0 }, { state = "High" }]
//!
//! [adapter]
//! target = "Ecological_Effect"
//! response = "label"
//!
//! [inference]
//! max_factor_cells = 16777216
//! ```

use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::adapter::AdapterDef;
use crate::engine::definition::{FactorDef, VariableDef};
use crate::engine::elimination::InferenceConfig;
use crate::engine::errors::BnError;
use crate::engine::features::FeatureDef;
use crate::engine::model::Model;
use crate::engine::scenario::Scenario;

/// Complete declarative description of a model and its serving settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(rename = "variable", default)]
    pub variables: Vec<VariableDef>,
    #[serde(rename = "factor", default)]
    pub factors: Vec<FactorDef>,
    #[serde(rename = "feature", default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<FeatureDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<AdapterDef>,
    #[serde(default)]
    pub inference: InferenceConfig,
}

impl ModelDefinition {
    pub fn from_toml_str(source: &str) -> Result<Self, BnError> {
        parse_toml(source)
    }

    pub fn from_json_str(source: &str) -> Result<Self, BnError> {
        parse_json(source)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BnError> {
        load_document(path.as_ref())
    }

    /// Builds the model, attaching feature bindings.
    pub fn build(self) -> Result<Model, BnError> {
        Model::build(self.variables, self.factors)?.with_features(self.features)
    }
}

/// A batch of scenarios, as written in a scenario file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioFile {
    #[serde(rename = "scenario", default)]
    pub scenarios: Vec<Scenario>,
}

impl ScenarioFile {
    pub fn from_toml_str(source: &str) -> Result<Self, BnError> {
        parse_toml(source)
    }

    pub fn from_json_str(source: &str) -> Result<Self, BnError> {
        parse_json(source)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BnError> {
        load_document(path.as_ref())
    }
}

/// A model loaded from disk together with its serving settings.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model: Model,
    pub adapter: Option<AdapterDef>,
    pub inference: InferenceConfig,
}

/// Reads, parses and builds a model file.
pub fn load_model(path: impl AsRef<Path>) -> Result<LoadedModel, BnError> {
    let path = path.as_ref();
    let definition = ModelDefinition::load(path)?;
    let adapter = definition.adapter.clone();
    let inference = definition.inference.validate()?;
    let model = definition.build()?;
    tracing::info!(
        path = %path.display(),
        variables = model.len(),
        features = model.features().len(),
        "loaded model"
    );
    Ok(LoadedModel {
        model,
        adapter,
        inference,
    })
}

fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T, BnError> {
    let source = fs::read_to_string(path)
        .map_err(|e| BnError::Config(format!("cannot read '{}': {}", path.display(), e)))?;
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        parse_json(&source)
    } else {
        parse_toml(&source)
    };
    parsed.map_err(|e| match e {
        BnError::Config(msg) => BnError::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

fn parse_toml<T: DeserializeOwned>(source: &str) -> Result<T, BnError> {
    toml::from_str(source).map_err(|e| BnError::Config(e.to_string()))
}

fn parse_json<T: DeserializeOwned>(source: &str) -> Result<T, BnError> {
    serde_json::from_str(source).map_err(|e| BnError::Config(e.to_string()))
}
