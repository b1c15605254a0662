//! Load objective: keep unconstrained teachers busy, then keep their loads
//! close together.
//!
//! `maximize util - (maxLoad - minLoad)` where `util` is the number of periods
//! taught by teachers without an enforced weekly limit, and `maxLoad` /
//! `minLoad` bracket those teachers' weekly totals.

use crate::compiler::CompiledModel;
use crate::data::Rules;
use crate::model::{ConstraintKind, LinearExpr, Relation, Sense, VarId};
use crate::problem::{Problem, TeacherId};
use log::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadObjective {
    pub teachers: Vec<TeacherId>,
    pub utilization: VarId,
    pub max_load: VarId,
    pub min_load: VarId,
}

/// Attaches the objective. Returns `None` when every teacher's load is
/// pinned by a limit, which leaves a pure satisfaction problem.
pub fn attach(problem: &Problem, rules: &Rules, compiled: &mut CompiledModel) -> Option<LoadObjective> {
    let teachers: Vec<TeacherId> = problem.unconstrained_teachers(rules).collect();
    if teachers.is_empty() {
        info!("Every teacher has a weekly limit; solving for feasibility only");
        return None;
    }

    let classes = problem.num_classes() as i64;
    let slots = problem.week().slots_per_week() as i64;
    // Each class-slot is taught exactly once, and common teachers with an
    // enforced limit take exactly that many of every class's slots.
    let pinned: i64 = problem
        .teachers()
        .iter()
        .enumerate()
        .filter(|(_, teacher)| teacher.common)
        .filter_map(|(t, _)| problem.enforced_limit(t, rules))
        .map(i64::from)
        .sum();
    let util_cap = (classes * (slots - pinned)).max(0);

    let model = &mut compiled.model;
    let x = &compiled.x;
    let utilization = model.add_int_var("utilization", 0, util_cap);
    let max_load = model.add_int_var("max_load", 0, slots);
    let min_load = model.add_int_var("min_load", 0, slots);

    let mut util = LinearExpr::sum([utilization]);
    for &t in &teachers {
        let total = x.teacher_total(t);
        util.add_scaled(&total, -1);

        let mut below_max = total.clone();
        below_max.add_term(max_load, -1);
        model.add_linear_constraint(ConstraintKind::LoadBalance, below_max, Relation::Le, 0);

        let mut above_min = LinearExpr::sum([min_load]);
        above_min.add_scaled(&total, -1);
        model.add_linear_constraint(ConstraintKind::LoadBalance, above_min, Relation::Le, 0);
    }
    model.add_linear_constraint(ConstraintKind::LoadBalance, util, Relation::Eq, 0);
    model.add_linear_constraint(
        ConstraintKind::LoadBalance,
        LinearExpr::sum([min_load]).term(max_load, -1),
        Relation::Le,
        0,
    );
    // The loads average util / n, so util lies between n * minLoad and
    // n * maxLoad.
    let n = teachers.len() as i64;
    model.add_linear_constraint(
        ConstraintKind::LoadBalance,
        LinearExpr::sum([utilization]).term(max_load, -n),
        Relation::Le,
        0,
    );
    model.add_linear_constraint(
        ConstraintKind::LoadBalance,
        LinearExpr::new().term(min_load, n).term(utilization, -1),
        Relation::Le,
        0,
    );

    model.set_objective(
        Sense::Maximize,
        LinearExpr::sum([utilization])
            .term(max_load, -1)
            .term(min_load, 1),
    );
    info!(
        "Objective over {} unconstrained teachers (utilization cap {})",
        teachers.len(),
        util_cap
    );

    Some(LoadObjective {
        teachers,
        utilization,
        max_load,
        min_load,
    })
}
