//! Read-only constraint store shared by every worker.
//!
//! All linear constraints are normalized to `Σ a·x ≤ b` rows with merged,
//! non-zero coefficients. Each variable keeps the list of rows it occurs in.

use crate::model::{Model, Relation, Sense, ValuePreference, VarKind};
use itertools::Itertools;

/// Right-hand side of the objective cut before any incumbent exists.
pub(crate) const INACTIVE_RHS: i64 = i64::MAX / 4;

#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub(crate) terms: Vec<(usize, i64)>,
    pub(crate) rhs: i64,
    /// Largest `|a|·(hi - lo)` over the initial domains. A row whose slack
    /// reaches this value cannot tighten anything.
    pub(crate) max_range: i64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Occurrence {
    pub(crate) row: usize,
    pub(crate) coef: i64,
}

/// Objective in maximization form.
#[derive(Debug, Clone)]
pub(crate) struct Goal {
    pub(crate) terms: Vec<(usize, i64)>,
    pub(crate) constant: i64,
    /// Row `-Σ a·x ≤ constant - bound` enforcing `objective ≥ bound`.
    pub(crate) cut_row: usize,
}

impl Goal {
    pub(crate) fn evaluate(&self, values: &[i64]) -> i64 {
        self.terms.iter().map(|&(v, a)| a * values[v]).sum::<i64>() + self.constant
    }
}

#[derive(Debug)]
pub(crate) struct Store {
    pub(crate) rows: Vec<Row>,
    pub(crate) occurrences: Vec<Vec<Occurrence>>,
    pub(crate) lo: Vec<i64>,
    pub(crate) hi: Vec<i64>,
    pub(crate) goal: Option<Goal>,
    /// Every variable exactly once, in branching order, with the value to try
    /// first.
    pub(crate) order: Vec<(usize, ValuePreference)>,
}

impl Store {
    pub(crate) fn build(model: &Model) -> Self {
        let lo: Vec<i64> = model.vars().iter().map(|v| v.lo).collect();
        let hi: Vec<i64> = model.vars().iter().map(|v| v.hi).collect();
        let mut store = Self {
            rows: Vec::with_capacity(model.num_constraints() * 2),
            occurrences: vec![Vec::new(); model.num_vars()],
            lo,
            hi,
            goal: None,
            order: Vec::with_capacity(model.num_vars()),
        };

        for c in model.constraints() {
            let terms = merge(c.expr.terms().iter().map(|&(v, a)| (v.index(), a)));
            let rhs = c.rhs - c.expr.constant();
            match c.relation {
                Relation::Le => store.push_row(terms, rhs),
                Relation::Ge => store.push_row(negate(&terms), -rhs),
                Relation::Eq => {
                    store.push_row(negate(&terms), -rhs);
                    store.push_row(terms, rhs);
                }
            }
        }

        if let Some(objective) = model.objective() {
            let sign = match objective.sense {
                Sense::Maximize => 1,
                Sense::Minimize => -1,
            };
            let terms = merge(
                objective
                    .expr
                    .terms()
                    .iter()
                    .map(|&(v, a)| (v.index(), a * sign)),
            );
            let cut_row = store.rows.len();
            store.push_row(negate(&terms), INACTIVE_RHS);
            store.goal = Some(Goal {
                terms,
                constant: objective.expr.constant() * sign,
                cut_row,
            });
        }

        store.order = branching_order(model, store.goal.as_ref());
        store
    }

    fn push_row(&mut self, terms: Vec<(usize, i64)>, rhs: i64) {
        let row = self.rows.len();
        let max_range = terms
            .iter()
            .map(|&(v, a)| a.abs() * (self.hi[v] - self.lo[v]))
            .max()
            .unwrap_or(0);
        for &(v, coef) in &terms {
            self.occurrences[v].push(Occurrence { row, coef });
        }
        self.rows.push(Row {
            terms,
            rhs,
            max_range,
        });
    }

    pub(crate) fn num_vars(&self) -> usize {
        self.lo.len()
    }
}

fn merge(terms: impl Iterator<Item = (usize, i64)>) -> Vec<(usize, i64)> {
    terms
        .into_group_map()
        .into_iter()
        .map(|(v, coefs)| (v, coefs.into_iter().sum::<i64>()))
        .filter(|&(_, a)| a != 0)
        .sorted_unstable()
        .collect()
}

fn negate(terms: &[(usize, i64)]) -> Vec<(usize, i64)> {
    terms.iter().map(|&(v, a)| (v, -a)).collect()
}

/// Strategy variables first, then the rest by index. Unhinted variables lean
/// towards the objective: up when their coefficient is positive, down when
/// negative, and booleans up otherwise.
fn branching_order(model: &Model, goal: Option<&Goal>) -> Vec<(usize, ValuePreference)> {
    let mut seen = vec![false; model.num_vars()];
    let mut order = Vec::with_capacity(model.num_vars());
    for strategy in model.strategies() {
        for var in &strategy.vars {
            let v = var.index();
            if !seen[v] {
                seen[v] = true;
                order.push((v, strategy.value));
            }
        }
    }

    let mut weight = vec![0i64; model.num_vars()];
    if let Some(goal) = goal {
        for &(v, a) in &goal.terms {
            weight[v] = a;
        }
    }
    for (v, def) in model.vars().iter().enumerate() {
        if seen[v] {
            continue;
        }
        let preference = match weight[v].signum() {
            1 => ValuePreference::Max,
            -1 => ValuePreference::Min,
            _ if def.kind == VarKind::Bool => ValuePreference::Max,
            _ => ValuePreference::Min,
        };
        order.push((v, preference));
    }
    order
}
