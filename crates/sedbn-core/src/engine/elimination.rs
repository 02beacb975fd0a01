//! Exact posterior inference by variable elimination.
//!
//! One symmetric procedure serves forward queries (evidence upstream, query
//! downstream) and diagnostic queries (evidence downstream, query upstream);
//! the DAG is treated as an undirected factor graph throughout.
//!
//! ## Steps
//!
//! 1. Drop barren variables: anything that is not an ancestor of a query or
//!    evidence variable sums to one and cannot affect the posterior.
//! 2. Instantiate every remaining CPT as a [`Factor`] and reduce it by all
//!    evidence. A factor that reduces to all zeros means the evidence is
//!    impossible under the model.
//! 3. Plan a deterministic elimination order with the min-weight heuristic:
//!    eliminate the variable whose resulting factor has the fewest cells; break
//!    ties by fewest neighbouring variables, then by topological position.
//!    The plan is checked against [`InferenceConfig::max_factor_cells`] before
//!    any table is allocated.
//! 4. For each variable in order, multiply the factors that mention it and sum
//!    it out.
//! 5. Multiply the remaining factors into the joint over the query variables,
//!    normalize, and marginalize per query variable.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::errors::BnError;
use crate::engine::evidence::{Evidence, ResolvedEvidence};
use crate::engine::factor::{cell_count, Factor};
use crate::engine::model::{Model, VarId};
use crate::engine::posterior::{Distribution, PosteriorResult};

/// Default cap on the number of cells in any intermediate factor (2^24).
pub const DEFAULT_MAX_FACTOR_CELLS: usize = 1 << 24;

/// Resource limits for a single inference call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Largest intermediate factor, in cells, the engine may allocate.
    pub max_factor_cells: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_factor_cells: DEFAULT_MAX_FACTOR_CELLS,
        }
    }
}

impl InferenceConfig {
    pub fn with_max_factor_cells(max_factor_cells: usize) -> Self {
        Self { max_factor_cells }
    }

    pub(crate) fn validate(self) -> Result<Self, BnError> {
        if self.max_factor_cells == 0 {
            return Err(BnError::Config("max_factor_cells must be > 0".into()));
        }
        Ok(self)
    }
}

/// Runtime diagnostics emitted by variable elimination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EliminationDiagnostics {
    /// Variables in the order they were summed out.
    pub elimination_order: Vec<Arc<str>>,
    /// Variables dropped before elimination as irrelevant to the query.
    pub pruned_variables: usize,
    /// Number of CPT factors instantiated.
    pub factors_instantiated: usize,
    /// Largest factor, in cells, produced during elimination.
    pub max_factor_cells: u128,
}

/// Computes posterior marginals for `query` given `evidence`, with default limits.
///
/// # Errors
///
/// - [`BnError::InvalidQuery`] if `query` is empty, repeats a variable, or
///   names an evidence variable.
/// - [`BnError::UnknownVariable`] / [`BnError::InvalidState`] for malformed
///   query or evidence entries.
/// - [`BnError::InconsistentEvidence`] if the evidence has zero probability.
/// - [`BnError::ModelTooLarge`] if an intermediate factor would exceed the limit.
///
/// # Example
///
/// ```rust,ignore
/// let evidence = Evidence::new().with("Ecological_Effect", "None");
/// let posterior = infer(&model, &evidence, &["Contaminant_Conc"])?;
/// let p_low = posterior.probability("Contaminant_Conc", "Low");
/// ```
pub fn infer<S: AsRef<str>>(
    model: &Model,
    evidence: &Evidence,
    query: &[S],
) -> Result<PosteriorResult, BnError> {
    infer_with_config(model, evidence, query, InferenceConfig::default())
}

/// Computes posterior marginals with explicit limits.
pub fn infer_with_config<S: AsRef<str>>(
    model: &Model,
    evidence: &Evidence,
    query: &[S],
    config: InferenceConfig,
) -> Result<PosteriorResult, BnError> {
    infer_with_diagnostics(model, evidence, query, config).map(|(result, _)| result)
}

/// Computes posterior marginals with explicit limits and diagnostics.
pub fn infer_with_diagnostics<S: AsRef<str>>(
    model: &Model,
    evidence: &Evidence,
    query: &[S],
    config: InferenceConfig,
) -> Result<(PosteriorResult, EliminationDiagnostics), BnError> {
    if query.is_empty() {
        return Err(BnError::InvalidQuery("no query variables".into()));
    }
    let query_ids = query
        .iter()
        .map(|name| model.id_of(name.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let resolved = evidence.resolve(model)?;
    infer_resolved(model, &resolved, &query_ids, config)
}

/// Core entry point over already-resolved ids.
pub fn infer_resolved(
    model: &Model,
    evidence: &ResolvedEvidence,
    query: &[VarId],
    config: InferenceConfig,
) -> Result<(PosteriorResult, EliminationDiagnostics), BnError> {
    let config = config.validate()?;
    validate_query(model, evidence, query)?;

    let relevant = relevant_variables(model, evidence, query);
    let relevant_count = relevant.iter().filter(|r| **r).count();

    let factors = instantiate_factors(model, evidence, &relevant)?;
    let factors_instantiated = factors.len();

    let plan = plan_elimination(model, &factors, query, config)?;
    tracing::debug!(
        order = ?plan.order.iter().map(|id| model.var(*id).name()).collect::<Vec<_>>(),
        max_factor_cells = %plan.max_cells,
        pruned = model.len() - relevant_count,
        "variable elimination plan"
    );

    let remaining = eliminate(factors, &plan.order);
    let result = posterior_from(model, remaining, query)?;

    let diagnostics = EliminationDiagnostics {
        elimination_order: plan
            .order
            .iter()
            .map(|id| model.var(*id).name_arc().clone())
            .collect(),
        pruned_variables: model.len() - relevant_count,
        factors_instantiated,
        max_factor_cells: plan.max_cells,
    };
    Ok((result, diagnostics))
}

fn validate_query(model: &Model, evidence: &ResolvedEvidence, query: &[VarId]) -> Result<(), BnError> {
    if query.is_empty() {
        return Err(BnError::InvalidQuery("no query variables".into()));
    }
    let mut seen = BTreeSet::new();
    for id in query {
        let name = model.var(*id).name();
        if !seen.insert(*id) {
            return Err(BnError::InvalidQuery(format!(
                "variable '{}' is queried more than once",
                name
            )));
        }
        if evidence.state_of(*id).is_some() {
            return Err(BnError::InvalidQuery(format!(
                "variable '{}' is both observed and queried",
                name
            )));
        }
    }
    Ok(())
}

/// Marks the ancestral closure of query and evidence variables.
fn relevant_variables(model: &Model, evidence: &ResolvedEvidence, query: &[VarId]) -> Vec<bool> {
    let mut relevant = vec![false; model.len()];
    let mut stack: Vec<VarId> = query
        .iter()
        .copied()
        .chain(evidence.iter().map(|(id, _)| id))
        .collect();
    while let Some(id) = stack.pop() {
        if relevant[id.index()] {
            continue;
        }
        relevant[id.index()] = true;
        stack.extend(model.parents(id).iter().copied());
    }
    relevant
}

fn instantiate_factors(
    model: &Model,
    evidence: &ResolvedEvidence,
    relevant: &[bool],
) -> Result<Vec<Factor>, BnError> {
    let mut factors = Vec::new();
    for &id in model.topological_order() {
        if !relevant[id.index()] {
            continue;
        }
        let mut factor = Factor::from_cpt(model.cpt(id));
        for (var, state) in evidence.iter() {
            if factor.contains(var) {
                factor = factor.reduce(var, state);
            }
        }
        if factor.is_all_zero() {
            return Err(BnError::InconsistentEvidence(format!(
                "observed states have zero probability under the CPT of '{}'",
                model.var(id).name()
            )));
        }
        factors.push(factor);
    }
    Ok(factors)
}

struct EliminationPlan {
    order: Vec<VarId>,
    max_cells: u128,
}

fn plan_elimination(
    model: &Model,
    factors: &[Factor],
    query: &[VarId],
    config: InferenceConfig,
) -> Result<EliminationPlan, BnError> {
    let limit = config.max_factor_cells;
    let card = |v: &VarId| model.var(*v).cardinality();

    let query_cells = cell_count(query.iter().map(card));
    if query_cells > limit as u128 {
        return Err(BnError::ModelTooLarge {
            cells: query_cells,
            limit,
        });
    }

    let mut scopes: Vec<BTreeSet<VarId>> = factors
        .iter()
        .map(|f| f.scope().iter().copied().collect())
        .collect();
    let mut candidates: BTreeSet<VarId> = scopes.iter().flatten().copied().collect();
    for q in query {
        candidates.remove(q);
    }

    let mut order = Vec::with_capacity(candidates.len());
    let mut max_cells = factors
        .iter()
        .map(|f| f.len() as u128)
        .max()
        .unwrap_or(1)
        .max(query_cells);

    while !candidates.is_empty() {
        // (resulting cells, neighbours, topological rank) → lexicographic minimum
        let mut best: Option<((u128, usize, usize), VarId, u128)> = None;
        for &var in &candidates {
            let mut joined: BTreeSet<VarId> = BTreeSet::new();
            for scope in scopes.iter().filter(|s| s.contains(&var)) {
                joined.extend(scope.iter().copied());
            }
            let joined_cells = cell_count(joined.iter().map(card));
            let result_cells = cell_count(joined.iter().filter(|v| **v != var).map(card));
            let key = (result_cells, joined.len() - 1, model.topological_rank(var));
            if best.as_ref().map_or(true, |(k, _, _)| key < *k) {
                best = Some((key, var, joined_cells));
            }
        }
        let Some((_, var, joined_cells)) = best else {
            break;
        };

        if joined_cells > limit as u128 {
            return Err(BnError::ModelTooLarge {
                cells: joined_cells,
                limit,
            });
        }
        max_cells = max_cells.max(joined_cells);

        let mut merged = BTreeSet::new();
        scopes.retain(|scope| {
            if scope.contains(&var) {
                merged.extend(scope.iter().copied());
                false
            } else {
                true
            }
        });
        merged.remove(&var);
        scopes.push(merged);
        candidates.remove(&var);
        order.push(var);
    }

    Ok(EliminationPlan { order, max_cells })
}

fn eliminate(mut factors: Vec<Factor>, order: &[VarId]) -> Vec<Factor> {
    for &var in order {
        let (mentioning, rest): (Vec<Factor>, Vec<Factor>) =
            factors.into_iter().partition(|f| f.contains(var));
        factors = rest;
        if let Some(product) = mentioning.into_iter().reduce(|acc, f| acc.product(&f)) {
            factors.push(product.sum_out(var));
        }
    }
    factors
}

fn posterior_from(
    model: &Model,
    remaining: Vec<Factor>,
    query: &[VarId],
) -> Result<PosteriorResult, BnError> {
    let mut joint = remaining
        .iter()
        .fold(Factor::scalar(1.0), |acc, f| acc.product(f));
    let total = joint.normalize();
    if !(total > 0.0 && total.is_finite()) {
        return Err(BnError::InconsistentEvidence(
            "evidence has zero joint probability under the model".into(),
        ));
    }

    let mut result = PosteriorResult::default();
    for &id in query {
        let var = model.var(id);
        let weights = joint.marginal(id).ok_or_else(|| {
            BnError::Internal(format!("query variable '{}' left the joint", var.name()))
        })?;
        let distribution = Distribution::from_weights(var.states().to_vec(), weights)
            .ok_or_else(|| {
                BnError::InconsistentEvidence(format!(
                    "posterior of '{}' has no probability mass",
                    var.name()
                ))
            })?;
        result.insert(var.name_arc().clone(), distribution);
    }
    Ok(result)
}
