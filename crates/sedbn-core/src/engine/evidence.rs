//! Evidence: observed states for a subset of variables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::errors::BnError;
use crate::engine::model::{Model, VarId};

/// A name-based partial assignment `{variable -> state}`.
///
/// Stored in a `BTreeMap` so iteration, and therefore validation error
/// reporting, is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Evidence {
    entries: BTreeMap<String, String>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, variable: impl Into<String>, state: impl Into<String>) -> Self {
        self.insert(variable, state);
        self
    }

    /// Sets the observed state of `variable`, returning the previous state.
    pub fn insert(&mut self, variable: impl Into<String>, state: impl Into<String>) -> Option<String> {
        self.entries.insert(variable.into(), state.into())
    }

    pub fn get(&self, variable: &str) -> Option<&str> {
        self.entries.get(variable).map(String::as_str)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.entries.contains_key(variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validates every entry against `model` and resolves it to ids.
    ///
    /// # Errors
    ///
    /// - [`BnError::UnknownVariable`] if a key is not a model variable.
    /// - [`BnError::InvalidState`] if a value is not a state of its variable.
    pub fn resolve(&self, model: &Model) -> Result<ResolvedEvidence, BnError> {
        let mut observed = Vec::with_capacity(self.entries.len());
        for (name, state) in &self.entries {
            let var = model.variable(name)?;
            let index = var.state_index(state).ok_or_else(|| BnError::InvalidState {
                variable: name.clone(),
                state: state.clone(),
            })?;
            observed.push((var.id(), index));
        }
        observed.sort_unstable_by_key(|(id, _)| *id);
        Ok(ResolvedEvidence { observed })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Evidence {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Evidence resolved to `(VarId, state index)` pairs, sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEvidence {
    observed: Vec<(VarId, usize)>,
}

impl ResolvedEvidence {
    pub(crate) fn from_pairs(mut observed: Vec<(VarId, usize)>) -> Self {
        observed.sort_unstable_by_key(|(id, _)| *id);
        observed.dedup_by_key(|(id, _)| *id);
        Self { observed }
    }

    pub fn state_of(&self, id: VarId) -> Option<usize> {
        self.observed
            .binary_search_by_key(&id, |(v, _)| *v)
            .ok()
            .map(|i| self.observed[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, usize)> + '_ {
        self.observed.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }
}
