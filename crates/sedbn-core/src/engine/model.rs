//! # Discrete Bayesian network model
//!
//! The [`Model`] owns its variables and their conditional probability tables
//! and is immutable once built. It is `Send + Sync` and is shared read-only by
//! every concurrent inference call, typically behind an `Arc`.
//!
//! ## Layout
//!
//! - Variables are addressed by a dense [`VarId`] assigned in declaration order.
//! - Each variable owns exactly one [`Cpt`], stored in a flat vector indexed by
//!   the child's `VarId`.
//! - CPT values are row-major over `(parents..., child)`: the child state is the
//!   fastest-varying dimension, and the last parent varies fastest among parents.
//! - The topological order (parents before children) is computed once at build
//!   time and cached.

use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::engine::definition::{FactorDef, VariableDef};
use crate::engine::errors::BnError;
use crate::engine::features::{FeatureDef, FeatureMap};

/// Maximum absolute deviation from 1.0 allowed for a CPT row sum.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// Dense identifier for a variable within one model.
///
/// VarId implements Ord/PartialOrd for stable, deterministic iteration.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct VarId(pub u32);

impl VarId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A discrete random variable with a finite, ordered set of states.
#[derive(Debug, Clone)]
pub struct Variable {
    id: VarId,
    name: Arc<str>,
    states: Vec<Arc<str>>,
    unit: Option<String>,
    description: Option<String>,
}

impl Variable {
    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    pub fn states(&self) -> &[Arc<str>] {
        &self.states
    }

    pub fn cardinality(&self) -> usize {
        self.states.len()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Index of a state label, matched exactly.
    pub fn state_index(&self, state: &str) -> Option<usize> {
        self.states.iter().position(|s| &**s == state)
    }
}

/// Conditional probability table owned by a single child variable.
#[derive(Debug, Clone)]
pub struct Cpt {
    child: VarId,
    parents: SmallVec<[VarId; 4]>,
    /// Cardinalities of `(parents..., child)`.
    cards: SmallVec<[usize; 4]>,
    values: Vec<f64>,
}

impl Cpt {
    pub fn child(&self) -> VarId {
        self.child
    }

    pub fn parents(&self) -> &[VarId] {
        &self.parents
    }

    /// Cardinalities of `(parents..., child)`, matching the value layout.
    pub fn cards(&self) -> &[usize] {
        &self.cards
    }

    /// Raw table values, row-major over `(parents..., child)`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Distribution over child states for one parent-state combination.
    ///
    /// Returns `None` if the combination has the wrong arity or an
    /// out-of-range state index.
    pub fn distribution(&self, parent_states: &[usize]) -> Option<&[f64]> {
        if parent_states.len() != self.parents.len() {
            return None;
        }
        let mut row = 0usize;
        for (&state, &card) in parent_states.iter().zip(self.cards.iter()) {
            if state >= card {
                return None;
            }
            row = row * card + state;
        }
        let child_card = *self.cards.last()?;
        let start = row * child_card;
        Some(&self.values[start..start + child_card])
    }
}

/// Immutable directed acyclic graphical model.
#[derive(Debug, Clone)]
pub struct Model {
    variables: Vec<Variable>,
    index: FxHashMap<Arc<str>, VarId>,
    cpts: Vec<Cpt>,
    children: Vec<SmallVec<[VarId; 4]>>,
    topo_order: Vec<VarId>,
    topo_rank: Vec<usize>,
    features: FeatureMap,
}

impl Model {
    /// Builds and validates a model from name-based definitions.
    ///
    /// # Errors
    ///
    /// Returns [`BnError::Structure`] if any variable is malformed, a CPT is
    /// missing, duplicated, references an unknown variable or state, lacks a
    /// parent-state combination, has a row that is not a distribution within
    /// [`NORMALIZATION_TOLERANCE`], or the parent relation contains a cycle.
    pub fn build(variables: Vec<VariableDef>, factors: Vec<FactorDef>) -> Result<Self, BnError> {
        if variables.is_empty() {
            return Err(BnError::Structure("model has no variables".into()));
        }

        let mut vars: Vec<Variable> = Vec::with_capacity(variables.len());
        let mut index: FxHashMap<Arc<str>, VarId> = FxHashMap::default();
        for (i, def) in variables.into_iter().enumerate() {
            let name = def.name.trim();
            if name.is_empty() {
                return Err(BnError::Structure(format!("variable #{} has an empty name", i)));
            }
            if def.states.is_empty() {
                return Err(BnError::Structure(format!("variable '{}' has no states", name)));
            }
            let mut states: Vec<Arc<str>> = Vec::with_capacity(def.states.len());
            for state in &def.states {
                if states.iter().any(|s| &**s == state.as_str()) {
                    return Err(BnError::Structure(format!(
                        "variable '{}' declares state '{}' twice",
                        name, state
                    )));
                }
                states.push(Arc::from(state.as_str()));
            }
            let id = VarId(i as u32);
            let name: Arc<str> = Arc::from(name);
            if index.insert(name.clone(), id).is_some() {
                return Err(BnError::Structure(format!("variable '{}' declared twice", name)));
            }
            vars.push(Variable {
                id,
                name,
                states,
                unit: def.unit,
                description: def.description,
            });
        }

        let mut slots: Vec<Option<Cpt>> = vec![None; vars.len()];
        for def in &factors {
            let cpt = compile_cpt(def, &vars, &index)?;
            let slot = &mut slots[cpt.child.index()];
            if slot.is_some() {
                return Err(BnError::Structure(format!(
                    "variable '{}' has more than one CPT",
                    def.child
                )));
            }
            *slot = Some(cpt);
        }

        let mut cpts = Vec::with_capacity(vars.len());
        for (var, slot) in vars.iter().zip(slots) {
            match slot {
                Some(cpt) => cpts.push(cpt),
                None => {
                    return Err(BnError::Structure(format!(
                        "variable '{}' has no CPT",
                        var.name
                    )))
                }
            }
        }

        let topo_order = topological_order(&vars, &cpts)?;
        let mut topo_rank = vec![0usize; vars.len()];
        for (rank, id) in topo_order.iter().enumerate() {
            topo_rank[id.index()] = rank;
        }

        let mut children: Vec<SmallVec<[VarId; 4]>> = vec![SmallVec::new(); vars.len()];
        for cpt in &cpts {
            for parent in &cpt.parents {
                children[parent.index()].push(cpt.child);
            }
        }

        tracing::debug!(
            variables = vars.len(),
            factors = cpts.len(),
            "built bayesian network model"
        );

        Ok(Self {
            variables: vars,
            index,
            cpts,
            children,
            topo_order,
            topo_rank,
            features: FeatureMap::default(),
        })
    }

    /// Attaches the external feature bindings used by the query adapter.
    ///
    /// Bindings are part of model configuration and are validated against the
    /// model's variables and states.
    pub fn with_features(mut self, features: Vec<FeatureDef>) -> Result<Self, BnError> {
        self.features = FeatureMap::compile(features, &self)?;
        Ok(self)
    }

    /// Variable identifiers in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &str> + '_ {
        self.variables.iter().map(|v| v.name())
    }

    pub fn iter_variables(&self) -> impl Iterator<Item = &Variable> + '_ {
        self.variables.iter()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Looks up a variable by name.
    pub fn variable(&self, name: &str) -> Result<&Variable, BnError> {
        self.id_of(name).map(|id| &self.variables[id.index()])
    }

    pub fn id_of(&self, name: &str) -> Result<VarId, BnError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| BnError::UnknownVariable(name.to_string()))
    }

    /// # Panics
    ///
    /// Panics if `id` was not issued by this model.
    pub fn var(&self, id: VarId) -> &Variable {
        &self.variables[id.index()]
    }

    /// The CPT owned by the named variable.
    pub fn factor_for(&self, name: &str) -> Result<&Cpt, BnError> {
        self.id_of(name).map(|id| &self.cpts[id.index()])
    }

    pub fn cpt(&self, id: VarId) -> &Cpt {
        &self.cpts[id.index()]
    }

    pub fn cpts(&self) -> &[Cpt] {
        &self.cpts
    }

    pub fn parents(&self, id: VarId) -> &[VarId] {
        &self.cpts[id.index()].parents
    }

    pub fn children(&self, id: VarId) -> &[VarId] {
        &self.children[id.index()]
    }

    /// Variables ordered parents-before-children.
    pub fn topological_order(&self) -> &[VarId] {
        &self.topo_order
    }

    /// Position of a variable in [`topological_order`](Self::topological_order).
    pub fn topological_rank(&self, id: VarId) -> usize {
        self.topo_rank[id.index()]
    }

    pub fn features(&self) -> &FeatureMap {
        &self.features
    }

    /// Number of cells in the full joint distribution, saturating at `u128::MAX`.
    pub fn joint_state_space(&self) -> u128 {
        self.variables
            .iter()
            .fold(1u128, |acc, v| acc.saturating_mul(v.cardinality() as u128))
    }
}

fn compile_cpt(
    def: &FactorDef,
    vars: &[Variable],
    index: &FxHashMap<Arc<str>, VarId>,
) -> Result<Cpt, BnError> {
    let child = *index.get(def.child.as_str()).ok_or_else(|| {
        BnError::Structure(format!("CPT for undeclared variable '{}'", def.child))
    })?;

    let mut parents: SmallVec<[VarId; 4]> = SmallVec::new();
    for name in &def.parents {
        let parent = *index.get(name.as_str()).ok_or_else(|| {
            BnError::Structure(format!(
                "CPT for '{}' references undeclared parent '{}'",
                def.child, name
            ))
        })?;
        if parent == child {
            return Err(BnError::Structure(format!(
                "variable '{}' lists itself as a parent",
                def.child
            )));
        }
        if parents.contains(&parent) {
            return Err(BnError::Structure(format!(
                "CPT for '{}' lists parent '{}' twice",
                def.child, name
            )));
        }
        parents.push(parent);
    }

    if def.prior.is_some() && !(def.rows.is_empty() && parents.is_empty()) {
        return Err(BnError::Structure(format!(
            "CPT for '{}' mixes the prior shorthand with parents or rows",
            def.child
        )));
    }

    let mut cards: SmallVec<[usize; 4]> =
        parents.iter().map(|p| vars[p.index()].cardinality()).collect();
    let child_var = &vars[child.index()];
    let child_card = child_var.cardinality();
    cards.push(child_card);

    let row_count = cards[..parents.len()]
        .iter()
        .try_fold(1usize, |acc, &c| acc.checked_mul(c))
        .and_then(|rows| rows.checked_mul(child_card).map(|_| rows))
        .ok_or_else(|| {
            BnError::Structure(format!("CPT for '{}' is too large to allocate", def.child))
        })?;

    // rows are checked sparsely; the dense table is allocated only once every
    // parent-state combination is known to be present
    let rows = def.expanded_rows();
    let mut seen: FxHashSet<usize> = FxHashSet::default();
    let mut filled: Vec<(usize, Vec<f64>)> = Vec::with_capacity(rows.len());

    for row in rows {
        if row.given.len() != parents.len() {
            return Err(BnError::Structure(format!(
                "CPT for '{}' has a row with {} parent states, expected {}",
                def.child,
                row.given.len(),
                parents.len()
            )));
        }

        let mut offset = 0usize;
        for ((label, parent), &card) in row.given.iter().zip(parents.iter()).zip(cards.iter()) {
            let parent_var = &vars[parent.index()];
            let state = parent_var.state_index(label).ok_or_else(|| {
                BnError::Structure(format!(
                    "CPT for '{}' uses unknown state '{}' of parent '{}'",
                    def.child, label, parent_var.name
                ))
            })?;
            offset = offset * card + state;
        }

        if !seen.insert(offset) {
            return Err(BnError::Structure(format!(
                "CPT for '{}' defines parent states [{}] twice",
                def.child,
                row.given.join(", ")
            )));
        }

        if row.probs.len() != child_card {
            return Err(BnError::Structure(format!(
                "CPT for '{}' has a row with {} probabilities, expected {}",
                def.child,
                row.probs.len(),
                child_card
            )));
        }
        if row.probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(BnError::Structure(format!(
                "CPT for '{}' contains a negative or non-finite probability",
                def.child
            )));
        }
        let sum: f64 = row.probs.iter().sum();
        if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
            return Err(BnError::Structure(format!(
                "CPT for '{}' row [{}] sums to {}, not 1",
                def.child,
                row.given.join(", "),
                sum
            )));
        }

        filled.push((offset, row.probs));
    }

    if filled.len() < row_count {
        // the first gap lies within the first filled.len() + 1 offsets
        let missing = (0..=filled.len())
            .find(|r| !seen.contains(r))
            .unwrap_or(filled.len());
        let labels = decode_row(missing, &parents, &cards, vars);
        return Err(BnError::Structure(format!(
            "CPT for '{}' is missing parent states [{}]",
            def.child,
            labels.join(", ")
        )));
    }

    let mut values = vec![0.0; row_count * child_card];
    for (offset, probs) in filled {
        values[offset * child_card..(offset + 1) * child_card].copy_from_slice(&probs);
    }

    Ok(Cpt {
        child,
        parents,
        cards,
        values,
    })
}

fn decode_row(mut row: usize, parents: &[VarId], cards: &[usize], vars: &[Variable]) -> Vec<String> {
    let mut labels = vec![String::new(); parents.len()];
    for i in (0..parents.len()).rev() {
        let state = row % cards[i];
        row /= cards[i];
        labels[i] = vars[parents[i].index()].states[state].to_string();
    }
    labels
}

fn topological_order(vars: &[Variable], cpts: &[Cpt]) -> Result<Vec<VarId>, BnError> {
    let mut graph: DiGraph<VarId, ()> = DiGraph::with_capacity(vars.len(), cpts.len());
    let nodes: Vec<NodeIndex> = vars.iter().map(|v| graph.add_node(v.id)).collect();
    for cpt in cpts {
        for parent in &cpt.parents {
            graph.add_edge(nodes[parent.index()], nodes[cpt.child.index()], ());
        }
    }

    toposort(&graph, None)
        .map(|order| order.into_iter().map(|n| graph[n]).collect())
        .map_err(|cycle| {
            let var = &vars[graph[cycle.node_id()].index()];
            BnError::Structure(format!("parent relation has a cycle through '{}'", var.name))
        })
}
