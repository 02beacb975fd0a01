//! Shared fixtures: bundled model paths, brute-force enumeration and a
//! seeded random network generator.

#![allow(dead_code)]

use std::path::PathBuf;

use sedbn_core::{load_model, CptRow, Evidence, FactorDef, LoadedModel, Model, VariableDef};

pub fn workspace_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join(relative)
}

pub fn sediment_model() -> LoadedModel {
    load_model(workspace_path("models/bc_sediment.toml")).expect("bundled model loads")
}

pub fn contaminant_effect() -> Model {
    Model::build(
        vec![
            VariableDef::new("Contaminant", ["Low", "High"]),
            VariableDef::new("Effect", ["None", "Toxic"]),
        ],
        vec![
            FactorDef::root("Contaminant", [0.7, 0.3]),
            FactorDef::conditional(
                "Effect",
                ["Contaminant"],
                vec![
                    CptRow::new(["Low"], [0.95, 0.05]),
                    CptRow::new(["High"], [0.2, 0.8]),
                ],
            ),
        ],
    )
    .expect("valid model")
}

/// Contamination is always low and the effect is a deterministic function of
/// it, so `Contaminant = High` and `Effect = Toxic` are impossible.
pub fn certain_exposure() -> Model {
    Model::build(
        vec![
            VariableDef::new("Contaminant", ["Low", "High"]),
            VariableDef::new("Effect", ["None", "Toxic"]),
        ],
        vec![
            FactorDef::root("Contaminant", [1.0, 0.0]),
            FactorDef::conditional(
                "Effect",
                ["Contaminant"],
                vec![
                    CptRow::new(["Low"], [1.0, 0.0]),
                    CptRow::new(["High"], [0.0, 1.0]),
                ],
            ),
        ],
    )
    .expect("valid model")
}

/// Exact posterior of `query` by summing the full joint. Returns `None` when
/// the evidence has zero probability.
pub fn brute_force(model: &Model, evidence: &Evidence, query: &str) -> Option<Vec<f64>> {
    let cards: Vec<usize> = model.iter_variables().map(|v| v.cardinality()).collect();
    let observed: Vec<(usize, usize)> = evidence
        .iter()
        .map(|(name, state)| {
            let var = model.variable(name).unwrap();
            (var.id().index(), var.state_index(state).unwrap())
        })
        .collect();
    let target = model.variable(query).unwrap();
    let target_index = target.id().index();

    let mut weights = vec![0.0; target.cardinality()];
    let mut assignment = vec![0usize; cards.len()];
    loop {
        if observed.iter().all(|(i, s)| assignment[*i] == *s) {
            let mut w = 1.0;
            for var in model.iter_variables() {
                let parents: Vec<usize> = model
                    .parents(var.id())
                    .iter()
                    .map(|p| assignment[p.index()])
                    .collect();
                w *= model.cpt(var.id()).distribution(&parents).unwrap()[assignment[var.id().index()]];
            }
            weights[assignment[target_index]] += w;
        }

        let mut dim = 0;
        loop {
            if dim == cards.len() {
                let total: f64 = weights.iter().sum();
                if total <= 0.0 {
                    return None;
                }
                return Some(weights.iter().map(|w| w / total).collect());
            }
            assignment[dim] += 1;
            if assignment[dim] < cards[dim] {
                break;
            }
            assignment[dim] = 0;
            dim += 1;
        }
    }
}

/// xorshift64*; enough to derive reproducible networks from a proptest seed.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Rng(seed | 1)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    pub fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Random DAG over `n` variables with 2-3 states each, at most two parents
/// drawn from earlier variables, and strictly positive CPT entries.
pub fn random_model(n: usize, seed: u64) -> Model {
    let mut rng = Rng::new(seed);
    let cards: Vec<usize> = (0..n).map(|_| 2 + rng.below(2)).collect();
    let name = |i: usize| format!("V{}", i);
    let state = |s: usize| format!("s{}", s);

    let variables: Vec<VariableDef> = (0..n)
        .map(|i| VariableDef::new(name(i), (0..cards[i]).map(state)))
        .collect();

    let mut factors = Vec::with_capacity(n);
    for child in 0..n {
        let mut parents: Vec<usize> = Vec::new();
        if child > 0 {
            for _ in 0..rng.below(3) {
                let p = rng.below(child);
                if !parents.contains(&p) {
                    parents.push(p);
                }
            }
        }

        let combos: usize = parents.iter().map(|p| cards[*p]).product();
        let mut rows = Vec::with_capacity(combos);
        for combo in 0..combos {
            let mut rest = combo;
            let mut given = vec![String::new(); parents.len()];
            for (slot, p) in parents.iter().enumerate().rev() {
                given[slot] = state(rest % cards[*p]);
                rest /= cards[*p];
            }
            let raw: Vec<f64> = (0..cards[child]).map(|_| 0.05 + rng.unit()).collect();
            let total: f64 = raw.iter().sum();
            let mut probs: Vec<f64> = raw.iter().map(|w| w / total).collect();
            // absorb rounding into the last entry so rows sum to 1 exactly enough
            let head: f64 = probs[..probs.len() - 1].iter().sum();
            let last = probs.len() - 1;
            probs[last] = 1.0 - head;
            rows.push(CptRow::new(given, probs));
        }
        factors.push(FactorDef::conditional(
            name(child),
            parents.iter().map(|p| name(*p)),
            rows,
        ));
    }

    Model::build(variables, factors).expect("random model is valid")
}

/// Observes each variable except `skip` with probability ~1/3.
pub fn random_evidence(model: &Model, seed: u64, skip: &str) -> Evidence {
    let mut rng = Rng::new(seed);
    let mut evidence = Evidence::new();
    for var in model.iter_variables() {
        if var.name() == skip || rng.below(3) != 0 {
            continue;
        }
        let state = rng.below(var.cardinality());
        evidence.insert(var.name(), var.states()[state].to_string());
    }
    evidence
}
