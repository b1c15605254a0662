//! Per-worker propagation state: variable bounds, a trail to undo them, and
//! the minimum activity of every row kept up to date incrementally.

use super::store::Store;
use crate::model::ValuePreference;
use std::collections::VecDeque;

/// A propagation step emptied some domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Conflict;

/// Outcome of a propagation or bound change.
pub(crate) type Propagation = Result<(), Conflict>;

/// A branching decision. `Exclude` removes `value` from the end of the domain
/// it sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Fix(usize, i64),
    Exclude(usize, i64),
}

#[derive(Debug, Clone, Copy)]
struct TrailEntry {
    var: usize,
    lo: i64,
    hi: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct State<'a> {
    store: &'a Store,
    lo: Vec<i64>,
    hi: Vec<i64>,
    min_activity: Vec<i64>,
    rhs: Vec<i64>,
    trail: Vec<TrailEntry>,
    queue: VecDeque<usize>,
    queued: Vec<bool>,
}

impl<'a> State<'a> {
    /// Fresh state at the initial bounds with every row queued.
    pub(crate) fn new(store: &'a Store) -> Self {
        let min_activity = store
            .rows
            .iter()
            .map(|row| {
                row.terms
                    .iter()
                    .map(|&(v, a)| if a > 0 { a * store.lo[v] } else { a * store.hi[v] })
                    .sum()
            })
            .collect();
        Self {
            store,
            lo: store.lo.clone(),
            hi: store.hi.clone(),
            min_activity,
            rhs: store.rows.iter().map(|r| r.rhs).collect(),
            trail: Vec::new(),
            queue: (0..store.rows.len()).collect(),
            queued: vec![true; store.rows.len()],
        }
    }

    pub(crate) fn is_fixed(&self, var: usize) -> bool {
        self.lo[var] == self.hi[var]
    }

    #[cfg(test)]
    pub(crate) fn bounds(&self, var: usize) -> (i64, i64) {
        (self.lo[var], self.hi[var])
    }

    /// Current trail height; pass it to [`State::undo_to`] to come back here.
    pub(crate) fn mark(&self) -> usize {
        self.trail.len()
    }

    /// Values of a fully fixed state.
    pub(crate) fn values(&self) -> Vec<i64> {
        debug_assert!((0..self.lo.len()).all(|v| self.is_fixed(v)));
        self.lo.clone()
    }

    fn enqueue(&mut self, row: usize) {
        if !self.queued[row] {
            self.queued[row] = true;
            self.queue.push_back(row);
        }
    }

    fn clear_queue(&mut self) {
        for row in self.queue.drain(..) {
            self.queued[row] = false;
        }
    }

    pub(crate) fn set_lo(&mut self, var: usize, value: i64) -> Propagation {
        let lo = self.lo[var];
        if value <= lo {
            return Ok(());
        }
        if value > self.hi[var] {
            return Err(Conflict);
        }
        self.trail.push(TrailEntry {
            var,
            lo,
            hi: self.hi[var],
        });
        let store = self.store;
        for occ in &store.occurrences[var] {
            if occ.coef > 0 {
                self.min_activity[occ.row] += occ.coef * (value - lo);
                self.enqueue(occ.row);
            }
        }
        self.lo[var] = value;
        Ok(())
    }

    pub(crate) fn set_hi(&mut self, var: usize, value: i64) -> Propagation {
        let hi = self.hi[var];
        if value >= hi {
            return Ok(());
        }
        if value < self.lo[var] {
            return Err(Conflict);
        }
        self.trail.push(TrailEntry {
            var,
            lo: self.lo[var],
            hi,
        });
        let store = self.store;
        for occ in &store.occurrences[var] {
            if occ.coef < 0 {
                self.min_activity[occ.row] += occ.coef * (value - hi);
                self.enqueue(occ.row);
            }
        }
        self.hi[var] = value;
        Ok(())
    }

    pub(crate) fn apply(&mut self, decision: Decision) -> Propagation {
        match decision {
            Decision::Fix(var, value) => {
                self.set_lo(var, value)?;
                self.set_hi(var, value)
            }
            Decision::Exclude(var, value) => {
                if value == self.lo[var] {
                    self.set_lo(var, value + 1)
                } else if value == self.hi[var] {
                    self.set_hi(var, value - 1)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Restores every bound changed after `mark` and drops pending work.
    pub(crate) fn undo_to(&mut self, mark: usize) {
        let store = self.store;
        while self.trail.len() > mark {
            let Some(entry) = self.trail.pop() else { break };
            let v = entry.var;
            let (lo, hi) = (self.lo[v], self.hi[v]);
            for occ in &store.occurrences[v] {
                if occ.coef > 0 {
                    self.min_activity[occ.row] -= occ.coef * (lo - entry.lo);
                } else {
                    self.min_activity[occ.row] -= occ.coef * (hi - entry.hi);
                }
            }
            self.lo[v] = entry.lo;
            self.hi[v] = entry.hi;
        }
        self.clear_queue();
        if let Some(goal) = &store.goal {
            self.enqueue(goal.cut_row);
        }
    }

    /// Requires the objective to reach at least `bound` from now on. The cut
    /// is never relaxed by backtracking.
    pub(crate) fn require_objective(&mut self, bound: i64) {
        let Some(goal) = &self.store.goal else { return };
        let rhs = goal.constant - bound;
        if rhs < self.rhs[goal.cut_row] {
            self.rhs[goal.cut_row] = rhs;
            self.enqueue(goal.cut_row);
        }
    }

    #[cfg(test)]
    pub(crate) fn has_cut(&self) -> bool {
        use super::store::INACTIVE_RHS;
        self.store
            .goal
            .as_ref()
            .is_some_and(|g| self.rhs[g.cut_row] < INACTIVE_RHS)
    }

    /// Runs every queued row to a fixpoint.
    pub(crate) fn propagate(&mut self) -> Propagation {
        while let Some(row) = self.queue.pop_front() {
            self.queued[row] = false;
            if let Err(conflict) = self.propagate_row(row) {
                self.clear_queue();
                return Err(conflict);
            }
        }
        Ok(())
    }

    fn propagate_row(&mut self, r: usize) -> Propagation {
        let store = self.store;
        let row = &store.rows[r];
        let slack = self.rhs[r] - self.min_activity[r];
        if slack < 0 {
            return Err(Conflict);
        }
        if slack >= row.max_range {
            return Ok(());
        }
        // Tightening a term never moves this row's own minimum activity, so
        // the slack stays valid for the whole scan.
        for &(v, a) in &row.terms {
            let (lo, hi) = (self.lo[v], self.hi[v]);
            if a > 0 {
                if a * (hi - lo) > slack {
                    self.set_hi(v, lo + slack / a)?;
                }
            } else if -a * (hi - lo) > slack {
                self.set_lo(v, hi - slack / -a)?;
            }
        }
        Ok(())
    }

    /// Next unfixed variable in branching order, starting at `cursor`, with
    /// the value to try first. Advances `cursor` past fixed variables.
    pub(crate) fn next_decision(&self, cursor: &mut usize) -> Option<(usize, i64)> {
        let order = &self.store.order;
        while *cursor < order.len() {
            let (var, preference) = order[*cursor];
            if !self.is_fixed(var) {
                let value = match preference {
                    ValuePreference::Max => self.hi[var],
                    ValuePreference::Min => self.lo[var],
                };
                return Some((var, value));
            }
            *cursor += 1;
        }
        None
    }
}
