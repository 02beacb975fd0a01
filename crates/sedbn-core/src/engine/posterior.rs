//! Posterior marginal distributions returned by inference.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Probabilities below this value after normalization are flushed to zero.
pub const FLUSH_EPSILON: f64 = 1e-12;

/// A normalized distribution over the ordered states of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    states: Vec<Arc<str>>,
    probs: Vec<f64>,
}

impl Distribution {
    /// Normalizes `weights` and flushes near-zero entries.
    ///
    /// Returns `None` if the weights do not have a positive finite sum or the
    /// lengths disagree.
    pub fn from_weights(states: Vec<Arc<str>>, weights: Vec<f64>) -> Option<Self> {
        if states.len() != weights.len() {
            return None;
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0 && total.is_finite()) {
            return None;
        }
        let mut probs: Vec<f64> = weights
            .into_iter()
            .map(|w| {
                let p = w / total;
                if p < FLUSH_EPSILON {
                    0.0
                } else {
                    p
                }
            })
            .collect();
        let flushed_total: f64 = probs.iter().sum();
        if flushed_total != 1.0 && flushed_total > 0.0 {
            for p in &mut probs {
                *p /= flushed_total;
            }
        }
        Some(Self { states, probs })
    }

    pub fn states(&self) -> &[Arc<str>] {
        &self.states
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probs
    }

    /// Probability of a state by label, or `None` if the label is unknown.
    pub fn probability(&self, state: &str) -> Option<f64> {
        self.states
            .iter()
            .position(|s| &**s == state)
            .map(|i| self.probs[i])
    }

    /// The most probable state and its probability. Ties go to the state
    /// declared first.
    pub fn most_probable(&self) -> (&str, f64) {
        let mut best = 0;
        for (i, p) in self.probs.iter().enumerate().skip(1) {
            if *p > self.probs[best] {
                best = i;
            }
        }
        (&*self.states[best], self.probs[best])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.states
            .iter()
            .zip(self.probs.iter())
            .map(|(s, p)| (&**s, *p))
    }
}

/// Serializes as an ordered `{state: probability}` map.
impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.states.len()))?;
        for (state, p) in self.iter() {
            map.serialize_entry(state, &p)?;
        }
        map.end()
    }
}

/// Posterior marginals keyed by query variable name.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct PosteriorResult {
    marginals: BTreeMap<Arc<str>, Distribution>,
}

impl PosteriorResult {
    pub(crate) fn insert(&mut self, variable: Arc<str>, distribution: Distribution) {
        self.marginals.insert(variable, distribution);
    }

    pub fn get(&self, variable: &str) -> Option<&Distribution> {
        self.marginals.get(variable)
    }

    /// Shorthand for `get(variable)?.probability(state)`.
    pub fn probability(&self, variable: &str, state: &str) -> Option<f64> {
        self.get(variable)?.probability(state)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Distribution)> + '_ {
        self.marginals.iter().map(|(k, v)| (&**k, v))
    }

    pub fn len(&self) -> usize {
        self.marginals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marginals.is_empty()
    }
}
