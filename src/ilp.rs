//! HiGHS backend: hands the linear model to HiGHS through good_lp.
//!
//! HiGHS returns whatever it holds when the time limit hits, so every answer
//! is checked against the model before it is reported.

use crate::data::SolveStatus;
use crate::error::SolveError;
use crate::model::{Backend, Model, Relation, Sense, SolveOutcome, VarId, VarKind};
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolutionStatus, SolverModel,
    Variable, constraint, default_solver, variable,
};
use log::{info, trace, warn};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighsBackend {
    threads: usize,
}

impl HighsBackend {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }
}

impl Default for HighsBackend {
    fn default() -> Self {
        Self::new(1)
    }
}

/// A solution cut short by the time or gap limit is only feasible.
fn status_of(status: SolutionStatus) -> SolveStatus {
    match status {
        SolutionStatus::Optimal => SolveStatus::Optimal,
        SolutionStatus::TimeLimit | SolutionStatus::GapLimit => SolveStatus::Feasible,
    }
}

fn expression(terms: &[(VarId, i64)], vars: &[Variable]) -> Expression {
    terms
        .iter()
        .map(|&(v, coef)| coef as f64 * vars[v.index()])
        .sum()
}

impl Backend for HighsBackend {
    fn name(&self) -> &'static str {
        "highs"
    }

    fn solve(&self, model: &Model, budget: Duration) -> Result<SolveOutcome, SolveError> {
        if model.num_vars() == 0 {
            return Err(SolveError::EmptyModel);
        }
        let start = Instant::now();

        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = model
            .vars()
            .iter()
            .map(|def| match def.kind {
                VarKind::Bool => problem.add(variable().binary().name(&def.name)),
                VarKind::Int => problem.add(
                    variable()
                        .integer()
                        .min(def.lo as f64)
                        .max(def.hi as f64)
                        .name(&def.name),
                ),
            })
            .collect();
        trace!("Declared {} HiGHS variables", vars.len());

        let goal = model
            .objective()
            .map(|o| (o.sense, expression(o.expr.terms(), &vars)));
        let unsolved = match goal {
            Some((Sense::Minimize, expr)) => problem.minimise(expr),
            Some((Sense::Maximize, expr)) => problem.maximise(expr),
            None => problem.maximise(Expression::from(0.0)),
        };
        let mut highs = unsolved
            .using(default_solver)
            .set_option("threads", self.threads as i32)
            .set_option("random_seed", 1234)
            .set_option("log_to_console", "false")
            .set_option("time_limit", budget.as_secs_f64());

        for c in model.constraints() {
            let lhs = expression(c.expr.terms(), &vars);
            let rhs = (c.rhs - c.expr.constant()) as f64;
            match c.relation {
                Relation::Le => highs.add_constraint(constraint!(lhs <= rhs)),
                Relation::Ge => highs.add_constraint(constraint!(lhs >= rhs)),
                Relation::Eq => highs.add_constraint(constraint!(lhs == rhs)),
            };
        }
        info!(
            "Starting HiGHS on {} variables and {} constraints (budget {:.1?})",
            model.num_vars(),
            model.num_constraints(),
            budget
        );

        let solution = match highs.solve() {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) => {
                info!("HiGHS proved the model infeasible");
                return Ok(SolveOutcome::without_solution(SolveStatus::Infeasible, 0));
            }
            Err(e) => return Err(SolveError::Highs(e.to_string())),
        };
        let elapsed = start.elapsed();

        let values: Vec<i64> = vars
            .iter()
            .map(|&v| solution.value(v).round() as i64)
            .collect();
        if let Some(violation) = model.first_violation(&values) {
            warn!("HiGHS answer rejected after {:.2?}: {}", elapsed, violation);
            return Ok(SolveOutcome::without_solution(SolveStatus::Unknown, 0));
        }

        let status = status_of(solution.status());
        info!("HiGHS finished with {} in {:.2?}", status, elapsed);
        Ok(SolveOutcome {
            status,
            objective: model.objective_value(&values),
            values: Some(values),
            nodes: 0,
        })
    }
}
