//! External feature bindings.
//!
//! A binding maps one externally named input feature onto a model variable.
//! Numeric inputs are discretized with configured thresholds; string inputs
//! are matched against the variable's state labels. Thresholds always come
//! from model configuration, never from the adapter.

use serde::{Deserialize, Serialize};

use crate::engine::errors::BnError;
use crate::engine::model::{Model, VarId};

/// A raw feature value as supplied by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Label(String),
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Label(v.to_string())
    }
}

/// One discretization bin. A value falls into the first bin whose `below`
/// bound it is strictly less than; the final bin has no bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinDef {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below: Option<f64>,
}

impl BinDef {
    pub fn below(state: impl Into<String>, bound: f64) -> Self {
        Self {
            state: state.into(),
            below: Some(bound),
        }
    }

    pub fn rest(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            below: None,
        }
    }
}

/// Declarative feature binding, as written in a model file's `[[feature]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    pub variable: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bins: Vec<BinDef>,
    /// Value used when a request omits this feature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<FeatureValue>,
}

impl FeatureDef {
    pub fn new(name: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variable: variable.into(),
            bins: Vec::new(),
            default: None,
        }
    }

    pub fn with_bins(mut self, bins: Vec<BinDef>) -> Self {
        self.bins = bins;
        self
    }

    pub fn with_default(mut self, value: impl Into<FeatureValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A validated binding resolved against a model.
#[derive(Debug, Clone)]
pub struct FeatureBinding {
    name: String,
    variable: VarId,
    /// `(upper bound, state index)`; the last entry is unbounded.
    bins: Vec<(Option<f64>, usize)>,
    default: Option<FeatureValue>,
}

impl FeatureBinding {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variable(&self) -> VarId {
        self.variable
    }

    pub fn default_value(&self) -> Option<&FeatureValue> {
        self.default.as_ref()
    }

    pub fn accepts_numbers(&self) -> bool {
        !self.bins.is_empty()
    }

    /// Maps a raw value to a state index of the bound variable.
    pub fn map_value(&self, model: &Model, value: &FeatureValue) -> Result<usize, BnError> {
        match value {
            FeatureValue::Number(x) => {
                if !x.is_finite() {
                    return Err(BnError::Feature(format!(
                        "feature '{}' must be a finite number",
                        self.name
                    )));
                }
                if self.bins.is_empty() {
                    return Err(BnError::Feature(format!(
                        "feature '{}' expects a state label, not a number",
                        self.name
                    )));
                }
                Ok(self
                    .bins
                    .iter()
                    .find(|(below, _)| below.map_or(true, |b| *x < b))
                    .map(|(_, state)| *state)
                    // compile() guarantees an unbounded last bin
                    .unwrap_or_else(|| self.bins[self.bins.len() - 1].1))
            }
            FeatureValue::Label(label) => {
                let var = model.var(self.variable);
                let label = label.trim();
                var.state_index(label)
                    .or_else(|| {
                        var.states()
                            .iter()
                            .position(|s| s.eq_ignore_ascii_case(label))
                    })
                    .ok_or_else(|| {
                        BnError::Feature(format!(
                            "feature '{}' has no state '{}'",
                            self.name, label
                        ))
                    })
            }
        }
    }
}

/// All feature bindings of a model, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FeatureMap {
    bindings: Vec<FeatureBinding>,
}

impl FeatureMap {
    pub(crate) fn compile(defs: Vec<FeatureDef>, model: &Model) -> Result<Self, BnError> {
        let mut bindings: Vec<FeatureBinding> = Vec::with_capacity(defs.len());
        for def in defs {
            if bindings.iter().any(|b| b.name == def.name) {
                return Err(BnError::Structure(format!(
                    "feature '{}' is bound twice",
                    def.name
                )));
            }
            let variable = model.id_of(&def.variable).map_err(|_| {
                BnError::Structure(format!(
                    "feature '{}' is bound to undeclared variable '{}'",
                    def.name, def.variable
                ))
            })?;
            let var = model.var(variable);

            let mut bins = Vec::with_capacity(def.bins.len());
            let mut last_bound = f64::NEG_INFINITY;
            for (i, bin) in def.bins.iter().enumerate() {
                let state = var.state_index(&bin.state).ok_or_else(|| {
                    BnError::Structure(format!(
                        "feature '{}' bins into unknown state '{}' of '{}'",
                        def.name, bin.state, def.variable
                    ))
                })?;
                let is_last = i + 1 == def.bins.len();
                match (bin.below, is_last) {
                    (None, true) => {}
                    (None, false) => {
                        return Err(BnError::Structure(format!(
                            "feature '{}': only the last bin may be unbounded",
                            def.name
                        )))
                    }
                    (Some(_), true) => {
                        return Err(BnError::Structure(format!(
                            "feature '{}': the last bin must be unbounded",
                            def.name
                        )))
                    }
                    (Some(bound), false) => {
                        if !bound.is_finite() || bound <= last_bound {
                            return Err(BnError::Structure(format!(
                                "feature '{}': bin bounds must be finite and strictly increasing",
                                def.name
                            )));
                        }
                        last_bound = bound;
                    }
                }
                bins.push((bin.below, state));
            }

            let binding = FeatureBinding {
                name: def.name,
                variable,
                bins,
                default: None,
            };
            if let Some(default) = &def.default {
                binding.map_value(model, default).map_err(|e| {
                    BnError::Structure(format!("invalid default for {}", e))
                })?;
            }
            bindings.push(FeatureBinding {
                default: def.default,
                ..binding
            });
        }
        Ok(Self { bindings })
    }

    pub fn get(&self, name: &str) -> Option<&FeatureBinding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureBinding> + '_ {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
