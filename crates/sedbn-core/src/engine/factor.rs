//! Dense discrete factors and the three operations variable elimination needs:
//! evidence reduction, pointwise product and summing out.
//!
//! A factor is a table over an ordered scope of variables, stored row-major
//! with the last scope variable varying fastest. A factor with an empty scope
//! is a scalar and holds exactly one value.

use smallvec::SmallVec;

use crate::engine::model::{Cpt, VarId};

pub(crate) type Scope = SmallVec<[VarId; 6]>;
type Dims = SmallVec<[usize; 6]>;

/// Dense table factor.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    scope: Scope,
    cards: Dims,
    values: Vec<f64>,
}

impl Factor {
    /// Instantiates a CPT as a factor over `(parents..., child)`.
    pub fn from_cpt(cpt: &Cpt) -> Self {
        let mut scope: Scope = cpt.parents().iter().copied().collect();
        scope.push(cpt.child());
        Self {
            scope,
            cards: cpt.cards().iter().copied().collect(),
            values: cpt.values().to_vec(),
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            scope: Scope::new(),
            cards: Dims::new(),
            values: vec![value],
        }
    }

    pub fn scope(&self) -> &[VarId] {
        &self.scope
    }

    pub fn cards(&self) -> &[usize] {
        &self.cards
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.scope.contains(&var)
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// True when every entry is exactly zero.
    pub fn is_all_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    fn position(&self, var: VarId) -> Option<usize> {
        self.scope.iter().position(|v| *v == var)
    }

    /// Fixes `var` to `state`, dropping that dimension. Factors not mentioning
    /// `var` are returned unchanged.
    pub fn reduce(&self, var: VarId, state: usize) -> Factor {
        let Some(pos) = self.position(var) else {
            return self.clone();
        };
        let strides = strides(&self.cards);
        let base = state * strides[pos];

        let mut scope = self.scope.clone();
        scope.remove(pos);
        let mut cards = self.cards.clone();
        cards.remove(pos);
        let mut src_strides = strides;
        src_strides.remove(pos);

        let mut values = Vec::with_capacity(cards.iter().product());
        walk(&cards, &src_strides, &src_strides, |offset, _| {
            values.push(self.values[base + offset]);
        });
        Factor {
            scope,
            cards,
            values,
        }
    }

    /// Pointwise product over the union of both scopes.
    ///
    /// The result scope is `self`'s scope followed by the variables only
    /// `other` mentions, in `other`'s order.
    pub fn product(&self, other: &Factor) -> Factor {
        let mut scope = self.scope.clone();
        let mut cards = self.cards.clone();
        for (var, card) in other.scope.iter().zip(other.cards.iter()) {
            if !scope.contains(var) {
                scope.push(*var);
                cards.push(*card);
            }
        }

        let a_strides = strides(&self.cards);
        let b_strides = strides(&other.cards);
        let project = |own_scope: &[VarId], own_strides: &[usize]| -> Dims {
            scope
                .iter()
                .map(|v| {
                    own_scope
                        .iter()
                        .position(|o| o == v)
                        .map_or(0, |i| own_strides[i])
                })
                .collect()
        };
        let sa = project(&self.scope, &a_strides);
        let sb = project(&other.scope, &b_strides);

        let mut values = Vec::with_capacity(cards.iter().product());
        walk(&cards, &sa, &sb, |ia, ib| {
            values.push(self.values[ia] * other.values[ib]);
        });
        Factor {
            scope,
            cards,
            values,
        }
    }

    /// Marginalizes `var` out of the factor by summation.
    pub fn sum_out(&self, var: VarId) -> Factor {
        let Some(pos) = self.position(var) else {
            return self.clone();
        };
        let mut scope = self.scope.clone();
        scope.remove(pos);
        let mut cards = self.cards.clone();
        cards.remove(pos);

        let mut out_strides = strides(&cards);
        out_strides.insert(pos, 0);
        let src_strides = strides(&self.cards);

        let mut values = vec![0.0; cards.iter().product()];
        walk(&self.cards, &src_strides, &out_strides, |src, dst| {
            values[dst] += self.values[src];
        });
        Factor {
            scope,
            cards,
            values,
        }
    }

    /// Distribution over a single scope variable, summing out all others.
    /// Not normalized.
    pub fn marginal(&self, var: VarId) -> Option<Vec<f64>> {
        let pos = self.position(var)?;
        let src_strides = strides(&self.cards);
        let mut out_strides: Dims = SmallVec::from_elem(0, self.cards.len());
        out_strides[pos] = 1;

        let mut values = vec![0.0; self.cards[pos]];
        walk(&self.cards, &src_strides, &out_strides, |src, dst| {
            values[dst] += self.values[src];
        });
        Some(values)
    }

    /// Divides every entry by the table sum. Returns the sum.
    pub fn normalize(&mut self) -> f64 {
        let total = self.sum();
        if total > 0.0 && total.is_finite() {
            for v in &mut self.values {
                *v /= total;
            }
        }
        total
    }
}

/// Number of cells of a factor over `cards`, saturating.
pub(crate) fn cell_count(cards: impl IntoIterator<Item = usize>) -> u128 {
    cards
        .into_iter()
        .fold(1u128, |acc, c| acc.saturating_mul(c as u128))
}

fn strides(cards: &[usize]) -> Dims {
    let mut strides: Dims = SmallVec::from_elem(0, cards.len());
    let mut acc = 1usize;
    for i in (0..cards.len()).rev() {
        strides[i] = acc;
        acc *= cards[i];
    }
    strides
}

/// Visits every assignment of `cards` in row-major order, passing the
/// corresponding linear offsets under two stride maps.
fn walk(cards: &[usize], sa: &[usize], sb: &[usize], mut visit: impl FnMut(usize, usize)) {
    if cards.iter().any(|c| *c == 0) {
        return;
    }
    let mut counter: Dims = SmallVec::from_elem(0, cards.len());
    let (mut ia, mut ib) = (0usize, 0usize);
    loop {
        visit(ia, ib);
        let mut dim = cards.len();
        loop {
            if dim == 0 {
                return;
            }
            dim -= 1;
            counter[dim] += 1;
            ia += sa[dim];
            ib += sb[dim];
            if counter[dim] < cards[dim] {
                break;
            }
            ia -= sa[dim] * cards[dim];
            ib -= sb[dim] * cards[dim];
            counter[dim] = 0;
        }
    }
}
