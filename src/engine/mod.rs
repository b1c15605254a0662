//! Built-in solve engine: bounds propagation over linear rows plus parallel
//! branch and bound.
//!
//! The root is propagated once and split into disjoint cubes. Workers pull
//! cubes from a shared queue, search each one depth first, and share only the
//! best objective, the incumbent and a stop flag. The search ends when every
//! cube is exhausted (the result is proven) or the deadline passes.

mod state;
mod store;
mod worker;

use crate::data::SolveStatus;
use crate::error::SolveError;
use crate::model::{Backend, Model, SolveOutcome};
use log::{debug, info};
use state::{Decision, State};
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};
use store::Store;
use worker::{Shared, Worker};

/// Cubes generated per worker, so that fast workers can take over work.
const CUBES_PER_WORKER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchEngine {
    workers: usize,
}

impl SearchEngine {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(8)
    }
}

impl Backend for SearchEngine {
    fn name(&self) -> &'static str {
        "search"
    }

    fn solve(&self, model: &Model, budget: Duration) -> Result<SolveOutcome, SolveError> {
        if model.num_vars() == 0 {
            return Err(SolveError::EmptyModel);
        }
        let start = Instant::now();
        let deadline = start + budget;
        let store = Store::build(model);
        debug!(
            "search store: {} variables, {} rows",
            store.num_vars(),
            store.rows.len()
        );

        let mut root = State::new(&store);
        if root.propagate().is_err() {
            info!("root propagation proved the model infeasible");
            return Ok(SolveOutcome::without_solution(SolveStatus::Infeasible, 0));
        }

        let cubes = split(&mut root, self.workers * CUBES_PER_WORKER, deadline);
        if cubes.is_empty() {
            info!("every root branch failed; model is infeasible");
            return Ok(SolveOutcome::without_solution(SolveStatus::Infeasible, 0));
        }
        let workers = self.workers.min(cubes.len());
        info!(
            "searching {} cubes with {} workers (budget {:.1?})",
            cubes.len(),
            workers,
            budget
        );

        let shared = Shared::new(cubes, deadline);
        thread::scope(|scope| {
            for id in 0..workers {
                let worker = Worker::new(id, &store, &shared, root.clone());
                scope.spawn(move || worker.run());
            }
        });

        let timed_out = shared.timed_out();
        let nodes = shared.nodes();
        let outcome = match (shared.into_incumbent(), timed_out) {
            (Some((_, values)), timed_out) => SolveOutcome {
                status: if timed_out {
                    SolveStatus::Feasible
                } else {
                    SolveStatus::Optimal
                },
                objective: model.objective_value(&values),
                values: Some(values),
                nodes,
            },
            (None, true) => SolveOutcome::without_solution(SolveStatus::Unknown, nodes),
            (None, false) => SolveOutcome::without_solution(SolveStatus::Infeasible, nodes),
        };
        info!(
            "search finished with {} after {:.2?} ({} nodes)",
            outcome.status,
            start.elapsed(),
            nodes
        );
        Ok(outcome)
    }
}

/// Breadth-first split of the root into at most `target` disjoint cubes.
/// Branches that fail propagation are dropped; they hold no solution.
fn split(root: &mut State<'_>, target: usize, deadline: Instant) -> Vec<Vec<Decision>> {
    let base = root.mark();
    let mut open: VecDeque<Vec<Decision>> = VecDeque::from([Vec::new()]);
    let mut leaves = Vec::new();

    while open.len() + leaves.len() < target && Instant::now() < deadline {
        let Some(cube) = open.pop_front() else { break };
        root.undo_to(base);
        let consistent = cube.iter().all(|&d| root.apply(d).is_ok()) && root.propagate().is_ok();
        if !consistent {
            continue;
        }
        let mut cursor = 0;
        match root.next_decision(&mut cursor) {
            Some((var, value)) => {
                let mut left = cube.clone();
                left.push(Decision::Fix(var, value));
                let mut right = cube;
                right.push(Decision::Exclude(var, value));
                open.push_back(left);
                open.push_back(right);
            }
            None => leaves.push(cube),
        }
    }
    root.undo_to(base);
    // Dropping the pending cut row leaves the root at its fixpoint.
    let settled = root.propagate();
    debug_assert!(settled.is_ok());

    leaves.extend(open);
    leaves
}
