//! Declarative, name-based model definitions.
//!
//! These are the plain-data inputs to [`Model::build`](crate::engine::model::Model::build).
//! They deserialize directly from the `[[variable]]` and `[[factor]]` tables of
//! a model file, and can equally be assembled in code.

use serde::{Deserialize, Serialize};

/// A discrete variable: unique name plus ordered state labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    pub states: Vec<String>,
    /// Physical unit or meaning. Documentation only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableDef {
    pub fn new<S: Into<String>>(name: impl Into<String>, states: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            states: states.into_iter().map(Into::into).collect(),
            unit: None,
            description: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One row of a conditional probability table: the parent states it applies
/// to (in the factor's parent order) and the distribution over child states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CptRow {
    #[serde(default)]
    pub given: Vec<String>,
    pub probs: Vec<f64>,
}

impl CptRow {
    pub fn new<S: Into<String>>(given: impl IntoIterator<Item = S>, probs: impl Into<Vec<f64>>) -> Self {
        Self {
            given: given.into_iter().map(Into::into).collect(),
            probs: probs.into(),
        }
    }
}

/// Conditional probability table for one child variable.
///
/// Root variables may use the `prior` shorthand instead of a single row with
/// an empty `given` list. Supplying both is a structure error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorDef {
    pub child: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<CptRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<Vec<f64>>,
}

impl FactorDef {
    /// Unconditional distribution for a root variable.
    pub fn root(child: impl Into<String>, prior: impl Into<Vec<f64>>) -> Self {
        Self {
            child: child.into(),
            parents: Vec::new(),
            rows: Vec::new(),
            prior: Some(prior.into()),
        }
    }

    /// Conditional table keyed by parent-state combination.
    pub fn conditional<S: Into<String>>(
        child: impl Into<String>,
        parents: impl IntoIterator<Item = S>,
        rows: Vec<CptRow>,
    ) -> Self {
        Self {
            child: child.into(),
            parents: parents.into_iter().map(Into::into).collect(),
            rows,
            prior: None,
        }
    }

    /// Rows with the `prior` shorthand expanded.
    pub(crate) fn expanded_rows(&self) -> Vec<CptRow> {
        match &self.prior {
            Some(prior) => {
                let mut rows = vec![CptRow {
                    given: Vec::new(),
                    probs: prior.clone(),
                }];
                rows.extend(self.rows.iter().cloned());
                rows
            }
            None => self.rows.clone(),
        }
    }
}
