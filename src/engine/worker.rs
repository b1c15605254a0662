//! Depth-first branch and bound over one cube at a time.

use super::state::{Decision, State};
use super::store::Store;
use log::trace;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// How many nodes a worker explores between two clock reads.
const CLOCK_INTERVAL: u64 = 256;

/// Sentinel for "no incumbent yet".
const NO_BOUND: i64 = i64::MIN;

/// State every worker reads and updates.
#[derive(Debug)]
pub(crate) struct Shared {
    cubes: Vec<Vec<Decision>>,
    next_cube: AtomicUsize,
    deadline: Instant,
    stop: AtomicBool,
    timed_out: AtomicBool,
    best: AtomicI64,
    incumbent: Mutex<Option<(i64, Vec<i64>)>>,
    nodes: AtomicU64,
}

impl Shared {
    pub(crate) fn new(cubes: Vec<Vec<Decision>>, deadline: Instant) -> Self {
        Self {
            cubes,
            next_cube: AtomicUsize::new(0),
            deadline,
            stop: AtomicBool::new(false),
            timed_out: AtomicBool::new(false),
            best: AtomicI64::new(NO_BOUND),
            incumbent: Mutex::new(None),
            nodes: AtomicU64::new(0),
        }
    }

    fn take_cube(&self) -> Option<&[Decision]> {
        let i = self.next_cube.fetch_add(1, Ordering::Relaxed);
        self.cubes.get(i).map(Vec::as_slice)
    }

    fn best(&self) -> Option<i64> {
        match self.best.load(Ordering::Acquire) {
            NO_BOUND => None,
            b => Some(b),
        }
    }

    /// Stores `values` if they beat the incumbent.
    fn offer(&self, objective: i64, values: Vec<i64>) -> bool {
        let mut incumbent = self.incumbent.lock().unwrap_or_else(PoisonError::into_inner);
        let improves = incumbent.as_ref().is_none_or(|(best, _)| objective > *best);
        if improves {
            *incumbent = Some((objective, values));
            self.best.fetch_max(objective, Ordering::AcqRel);
        }
        improves
    }

    fn out_of_time(&self) -> bool {
        if Instant::now() >= self.deadline {
            self.timed_out.store(true, Ordering::Release);
            self.stop.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    pub(crate) fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::Acquire)
    }

    pub(crate) fn nodes(&self) -> u64 {
        self.nodes.load(Ordering::Relaxed)
    }

    pub(crate) fn into_incumbent(self) -> Option<(i64, Vec<i64>)> {
        self
            .incumbent
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    mark: usize,
    var: usize,
    value: i64,
    cursor: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CubeEnd {
    /// The whole subtree was explored.
    Exhausted,
    /// Time ran out or another worker settled the problem.
    Stopped,
}

pub(crate) struct Worker<'a> {
    id: usize,
    store: &'a Store,
    shared: &'a Shared,
    state: State<'a>,
    root: usize,
    frames: Vec<Frame>,
    cursor: usize,
    nodes: u64,
    known_best: Option<i64>,
}

impl<'a> Worker<'a> {
    /// `state` must be propagated to a fixpoint at the root.
    pub(crate) fn new(id: usize, store: &'a Store, shared: &'a Shared, state: State<'a>) -> Self {
        let root = state.mark();
        Self {
            id,
            store,
            shared,
            state,
            root,
            frames: Vec::new(),
            cursor: 0,
            nodes: 0,
            known_best: None,
        }
    }

    /// Pulls cubes until the queue is empty or the search has to stop.
    pub(crate) fn run(mut self) {
        let mut cubes = 0;
        while let Some(cube) = self.shared.take_cube() {
            cubes += 1;
            if self.search(cube) == CubeEnd::Stopped {
                break;
            }
        }
        trace!(
            "worker {} done: {} cubes, {} nodes",
            self.id, cubes, self.nodes
        );
        self.shared.nodes.fetch_add(self.nodes, Ordering::Relaxed);
    }

    fn should_stop(&mut self) -> bool {
        self.nodes += 1;
        if self.shared.stop.load(Ordering::Acquire) {
            return true;
        }
        self.nodes % CLOCK_INTERVAL == 0 && self.shared.out_of_time()
    }

    /// Tightens the objective cut when some worker found something better.
    fn sync_bound(&mut self) {
        let best = self.shared.best();
        if best > self.known_best {
            self.known_best = best;
            if let Some(b) = best {
                self.state.require_objective(b + 1);
            }
        }
    }

    fn search(&mut self, cube: &[Decision]) -> CubeEnd {
        if self.shared.out_of_time() {
            return CubeEnd::Stopped;
        }
        self.state.undo_to(self.root);
        self.frames.clear();
        self.cursor = 0;

        let mut conflict = cube.iter().any(|&d| self.state.apply(d).is_err());
        loop {
            if self.should_stop() {
                return CubeEnd::Stopped;
            }
            if !conflict {
                self.sync_bound();
                conflict = self.state.propagate().is_err();
            }
            if conflict {
                if !self.backtrack() {
                    return CubeEnd::Exhausted;
                }
                conflict = false;
                continue;
            }

            match self.state.next_decision(&mut self.cursor) {
                Some((var, value)) => {
                    self.frames.push(Frame {
                        mark: self.state.mark(),
                        var,
                        value,
                        cursor: self.cursor,
                    });
                    conflict = self.state.apply(Decision::Fix(var, value)).is_err();
                }
                None => {
                    if self.record_solution() {
                        return CubeEnd::Stopped;
                    }
                    // The leaf cannot beat itself; look for something better.
                    conflict = true;
                }
            }
        }
    }

    /// Undoes the newest decision and applies its refutation. Returns false
    /// when no decision is left.
    fn backtrack(&mut self) -> bool {
        while let Some(frame) = self.frames.pop() {
            self.state.undo_to(frame.mark);
            self.cursor = frame.cursor;
            if self
                .state
                .apply(Decision::Exclude(frame.var, frame.value))
                .is_ok()
            {
                return true;
            }
        }
        false
    }

    /// Offers the current leaf to the shared incumbent. Returns true when the
    /// search is over, which is the case for models without an objective.
    fn record_solution(&mut self) -> bool {
        let values = self.state.values();
        match &self.store.goal {
            None => {
                self.shared.offer(0, values);
                self.shared.stop.store(true, Ordering::Release);
                true
            }
            Some(goal) => {
                let objective = goal.evaluate(&values);
                if self.shared.offer(objective, values) {
                    trace!("worker {} improved objective to {}", self.id, objective);
                }
                self.sync_bound();
                false
            }
        }
    }
}
