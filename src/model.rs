//! Backend-agnostic model: integer variables with bounds, linear constraints
//! and an optional linear objective.
//!
//! The constraint compiler only talks to this layer, so any [`Backend`] can
//! solve what it emits.

use crate::data::SolveStatus;
use crate::error::SolveError;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Bool,
    Int,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDef {
    pub name: String,
    pub kind: VarKind,
    pub lo: i64,
    pub hi: i64,
}

/// `Σ coef·var + constant`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearExpr {
    terms: Vec<(VarId, i64)>,
    constant: i64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of the given variables with coefficient one.
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1)).collect(),
            constant: 0,
        }
    }

    pub fn term(mut self, var: VarId, coef: i64) -> Self {
        self.add_term(var, coef);
        self
    }

    pub fn add_term(&mut self, var: VarId, coef: i64) {
        self.terms.push((var, coef));
    }

    /// Adds `factor · other` to this expression.
    pub fn add_scaled(&mut self, other: &LinearExpr, factor: i64) {
        self.terms
            .extend(other.terms.iter().map(|&(v, c)| (v, c * factor)));
        self.constant += other.constant * factor;
    }

    pub fn terms(&self) -> &[(VarId, i64)] {
        &self.terms
    }

    pub fn constant(&self) -> i64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn evaluate(&self, values: &[i64]) -> i64 {
        self.terms
            .iter()
            .map(|&(v, c)| c * values[v.index()])
            .sum::<i64>()
            + self.constant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

/// Which rule a constraint encodes. Used for logging and auditing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintKind {
    ExactlyOneTeacher,
    NoDoubleBooking,
    DailySubjectCap,
    SubjectExclusivity,
    ExclusivityLink,
    HomeroomContinuity,
    Fatigue,
    WeeklyLimit,
    ClassLoadCap,
    LoadBalance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    pub kind: ConstraintKind,
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: i64,
}

impl LinearConstraint {
    pub fn is_satisfied(&self, values: &[i64]) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.relation {
            Relation::Le => lhs <= self.rhs,
            Relation::Ge => lhs >= self.rhs,
            Relation::Eq => lhs == self.rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objective {
    pub sense: Sense,
    pub expr: LinearExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuePreference {
    Max,
    Min,
}

/// Branching hint: try `vars` in this order, each with `value` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionStrategy {
    pub vars: Vec<VarId>,
    pub value: ValuePreference,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    vars: Vec<VarDef>,
    constraints: Vec<LinearConstraint>,
    objective: Option<Objective>,
    strategies: Vec<DecisionStrategy>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bool_var(&mut self, name: impl Into<String>) -> VarId {
        self.push_var(name.into(), VarKind::Bool, 0, 1)
    }

    pub fn add_int_var(&mut self, name: impl Into<String>, lo: i64, hi: i64) -> VarId {
        self.push_var(name.into(), VarKind::Int, lo, hi)
    }

    fn push_var(&mut self, name: String, kind: VarKind, lo: i64, hi: i64) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(VarDef { name, kind, lo, hi });
        id
    }

    pub fn add_linear_constraint(
        &mut self,
        kind: ConstraintKind,
        expr: LinearExpr,
        relation: Relation,
        rhs: i64,
    ) {
        self.constraints.push(LinearConstraint {
            kind,
            expr,
            relation,
            rhs,
        });
    }

    pub fn set_objective(&mut self, sense: Sense, expr: LinearExpr) {
        self.objective = Some(Objective { sense, expr });
    }

    pub fn add_decision_strategy(&mut self, vars: Vec<VarId>, value: ValuePreference) {
        self.strategies.push(DecisionStrategy { vars, value });
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    pub fn strategies(&self) -> &[DecisionStrategy] {
        &self.strategies
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn count_by_kind(&self) -> BTreeMap<ConstraintKind, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.constraints {
            *counts.entry(c.kind).or_insert(0) += 1;
        }
        counts
    }

    /// First constraint or bound the values break, if any.
    pub fn first_violation(&self, values: &[i64]) -> Option<String> {
        if values.len() != self.vars.len() {
            return Some(format!(
                "expected {} values, got {}",
                self.vars.len(),
                values.len()
            ));
        }
        if let Some((var, value)) = self
            .vars
            .iter()
            .zip(values)
            .find(|(var, value)| **value < var.lo || **value > var.hi)
        {
            return Some(format!("{} = {} is out of bounds", var.name, value));
        }
        self.constraints
            .iter()
            .find(|c| !c.is_satisfied(values))
            .map(|c| format!("{:?} constraint violated", c.kind))
    }

    pub fn objective_value(&self, values: &[i64]) -> Option<i64> {
        self.objective.as_ref().map(|o| o.expr.evaluate(values))
    }
}

/// What a backend hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub values: Option<Vec<i64>>,
    pub objective: Option<i64>,
    pub nodes: u64,
}

impl SolveOutcome {
    pub fn without_solution(status: SolveStatus, nodes: u64) -> Self {
        Self {
            status,
            values: None,
            objective: None,
            nodes,
        }
    }
}

/// A solver able to search a [`Model`].
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, model: &Model, budget: Duration) -> Result<SolveOutcome, SolveError>;
}
