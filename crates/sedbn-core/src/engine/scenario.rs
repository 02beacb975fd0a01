//! Scenario evaluation: batches of independent "what-if" queries.
//!
//! Each scenario runs its own inference call against the shared, read-only
//! model. A failure in one scenario is recorded next to its name and does not
//! stop the others. With the `parallel` feature the batch is dispatched on the
//! rayon pool; results are identical and returned in input order either way.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::engine::elimination::{infer_with_config, InferenceConfig};
use crate::engine::errors::BnError;
use crate::engine::evidence::Evidence;
use crate::engine::model::Model;
use crate::engine::posterior::PosteriorResult;

/// A named evidence bundle plus the variables whose posteriors are wanted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub evidence: Evidence,
    pub query: Vec<String>,
}

impl Scenario {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        evidence: Evidence,
        query: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            evidence,
            query: query.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result or error for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub name: String,
    pub result: Result<PosteriorResult, BnError>,
}

impl ScenarioOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a scenario batch, in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScenarioReport {
    outcomes: Vec<ScenarioOutcome>,
}

impl ScenarioReport {
    pub fn outcomes(&self) -> &[ScenarioOutcome] {
        &self.outcomes
    }

    pub fn get(&self, name: &str) -> Option<&Result<PosteriorResult, BnError>> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.result)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Probability of `variable = state` in every scenario. `None` where the
    /// scenario failed or did not query `variable`.
    pub fn compare(&self, variable: &str, state: &str) -> Vec<(&str, Option<f64>)> {
        self.outcomes
            .iter()
            .map(|o| {
                let p = o
                    .result
                    .as_ref()
                    .ok()
                    .and_then(|r| r.probability(variable, state));
                (o.name.as_str(), p)
            })
            .collect()
    }
}

/// Evaluates every scenario with default inference limits.
///
/// # Errors
///
/// Returns [`BnError::DuplicateScenario`] before any inference runs if two
/// scenarios share a name. Per-scenario failures are reported in the
/// [`ScenarioReport`], not here.
pub fn evaluate(model: &Model, scenarios: &[Scenario]) -> Result<ScenarioReport, BnError> {
    evaluate_with_config(model, scenarios, InferenceConfig::default())
}

/// Evaluates every scenario with explicit inference limits.
pub fn evaluate_with_config(
    model: &Model,
    scenarios: &[Scenario],
    config: InferenceConfig,
) -> Result<ScenarioReport, BnError> {
    check_unique_names(scenarios)?;

    let run = |scenario: &Scenario| ScenarioOutcome {
        name: scenario.name.clone(),
        result: infer_with_config(model, &scenario.evidence, &scenario.query, config),
    };

    #[cfg(feature = "parallel")]
    let outcomes: Vec<ScenarioOutcome> = scenarios.par_iter().map(run).collect();
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<ScenarioOutcome> = scenarios.iter().map(run).collect();

    for outcome in &outcomes {
        if let Err(err) = &outcome.result {
            tracing::warn!(scenario = %outcome.name, kind = err.kind(), error = %err, "scenario failed");
        }
    }

    let report = ScenarioReport { outcomes };
    tracing::info!(
        scenarios = report.len(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        "evaluated scenario batch"
    );
    Ok(report)
}

fn check_unique_names(scenarios: &[Scenario]) -> Result<(), BnError> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for scenario in scenarios {
        if !seen.insert(scenario.name.as_str()) {
            return Err(BnError::DuplicateScenario(scenario.name.clone()));
        }
    }
    Ok(())
}
