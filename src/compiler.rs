//! Translates a validated [`Problem`] into variables and hard constraints.
//!
//! The compiler never searches. Emission order only affects the order in
//! which a backend explores, never the feasible set.

use crate::data::Rules;
use crate::model::{ConstraintKind, LinearExpr, Model, Relation, ValuePreference, VarId};
use crate::problem::{Problem, TeacherId, Week};
use log::{debug, info};

/// The boolean grid `X[day, class, period, teacher]` stored flat.
#[derive(Debug, Clone)]
pub struct AssignmentVars {
    week: Week,
    num_classes: usize,
    num_teachers: usize,
    vars: Vec<VarId>,
}

impl AssignmentVars {
    /// Adds one boolean per (day, class, period, teacher) to `model`.
    pub fn create(model: &mut Model, week: &Week, num_classes: usize, num_teachers: usize) -> Self {
        let mut vars = Vec::with_capacity(week.num_cells(num_classes) * num_teachers);
        for d in 0..week.num_days() {
            for c in 0..num_classes {
                for p in 0..week.periods_for_day(d) {
                    for t in 0..num_teachers {
                        vars.push(model.add_bool_var(format!("x_{d}_{c}_{p}_{t}")));
                    }
                }
            }
        }
        Self {
            week: week.clone(),
            num_classes,
            num_teachers,
            vars,
        }
    }

    pub fn get(&self, day: usize, class: usize, period: usize, teacher: TeacherId) -> VarId {
        self.vars[self.week.cell(self.num_classes, day, class, period) * self.num_teachers + teacher]
    }

    pub fn week(&self) -> &Week {
        &self.week
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn num_teachers(&self) -> usize {
        self.num_teachers
    }

    /// `totalPeriods[teacher, class]`
    pub fn class_total(&self, teacher: TeacherId, class: usize) -> LinearExpr {
        LinearExpr::sum(
            self.week
                .slots()
                .map(|(d, p)| self.get(d, class, p, teacher)),
        )
    }

    /// `teacherTotalPeriods[teacher]`
    pub fn teacher_total(&self, teacher: TeacherId) -> LinearExpr {
        let mut total = LinearExpr::new();
        for c in 0..self.num_classes {
            total.add_scaled(&self.class_total(teacher, c), 1);
        }
        total
    }

    /// Periods of `teachers` in one class on one day.
    fn day_total(&self, day: usize, class: usize, teachers: &[TeacherId]) -> LinearExpr {
        LinearExpr::sum(
            (0..self.week.periods_for_day(day))
                .flat_map(|p| teachers.iter().map(move |&t| self.get(day, class, p, t))),
        )
    }
}

/// The compiled model plus the handles needed to read a solution back.
#[derive(Debug, Clone)]
pub struct CompiledModel {
    pub model: Model,
    pub x: AssignmentVars,
}

pub fn compile(problem: &Problem, rules: &Rules) -> CompiledModel {
    let mut model = Model::new();
    let x = AssignmentVars::create(
        &mut model,
        problem.week(),
        problem.num_classes(),
        problem.num_teachers(),
    );

    exactly_one_teacher(&mut model, &x);
    no_double_booking(&mut model, &x);
    if let Some(cap) = rules.max_daily_subject_periods {
        daily_subject_cap(&mut model, problem, &x, cap);
    }
    subject_exclusivity(&mut model, problem, &x);
    if rules.homeroom_continuity {
        homeroom_continuity(&mut model, problem, &x);
    }
    if let Some(cap) = rules.max_consecutive_periods {
        fatigue(&mut model, &x, cap);
    }
    if rules.weekly_limits {
        weekly_limits(&mut model, problem, &x);
    }
    decision_strategy(&mut model, &x);

    for (kind, count) in model.count_by_kind() {
        debug!("{:?}: {} constraints", kind, count);
    }
    info!(
        "Compiled model with {} variables and {} constraints",
        model.num_vars(),
        model.num_constraints()
    );
    CompiledModel { model, x }
}

/// Every class has exactly one teacher in every slot.
pub(crate) fn exactly_one_teacher(model: &mut Model, x: &AssignmentVars) {
    for d in 0..x.week().num_days() {
        for c in 0..x.num_classes() {
            for p in 0..x.week().periods_for_day(d) {
                let slot = LinearExpr::sum((0..x.num_teachers()).map(|t| x.get(d, c, p, t)));
                model.add_linear_constraint(ConstraintKind::ExactlyOneTeacher, slot, Relation::Eq, 1);
            }
        }
    }
}

/// No teacher is in two classes at once.
pub(crate) fn no_double_booking(model: &mut Model, x: &AssignmentVars) {
    if x.num_classes() < 2 {
        return;
    }
    for (d, p) in x.week().slots() {
        for t in 0..x.num_teachers() {
            let busy = LinearExpr::sum((0..x.num_classes()).map(|c| x.get(d, c, p, t)));
            model.add_linear_constraint(ConstraintKind::NoDoubleBooking, busy, Relation::Le, 1);
        }
    }
}

fn daily_subject_cap(model: &mut Model, problem: &Problem, x: &AssignmentVars, cap: u32) {
    let week = problem.week();
    for d in 0..week.num_days() {
        if week.periods_for_day(d) <= cap as usize {
            continue;
        }
        for c in 0..problem.num_classes() {
            for group in problem.subject_groups().values() {
                model.add_linear_constraint(
                    ConstraintKind::DailySubjectCap,
                    x.day_total(d, c, group),
                    Relation::Le,
                    i64::from(cap),
                );
            }
        }
    }
}

/// One non-common teacher per subject per class. `Y[t, c]` is linked to
/// "teacher `t` teaches class `c` at all" and summed per subject group.
fn subject_exclusivity(model: &mut Model, problem: &Problem, x: &AssignmentVars) {
    let slots = problem.week().slots_per_week() as i64;
    let mut teaches: Vec<Vec<Option<VarId>>> =
        vec![vec![None; problem.num_classes()]; problem.num_teachers()];

    for (t, teacher) in problem.teachers().iter().enumerate() {
        if teacher.common {
            continue;
        }
        for c in 0..problem.num_classes() {
            let y = model.add_bool_var(format!("y_{t}_{c}"));
            let total = x.class_total(t, c);

            let mut upper = total.clone();
            upper.add_term(y, -slots);
            model.add_linear_constraint(ConstraintKind::ExclusivityLink, upper, Relation::Le, 0);

            let mut lower = LinearExpr::sum([y]);
            lower.add_scaled(&total, -1);
            model.add_linear_constraint(ConstraintKind::ExclusivityLink, lower, Relation::Le, 0);

            teaches[t][c] = Some(y);
        }
    }

    for subject in problem.subject_groups().keys() {
        let group = problem.exclusive_group(subject);
        if group.is_empty() {
            continue;
        }
        for c in 0..problem.num_classes() {
            let chosen = LinearExpr::sum(group.iter().filter_map(|&t| teaches[t][c]));
            model.add_linear_constraint(ConstraintKind::SubjectExclusivity, chosen, Relation::Eq, 1);
        }
    }
}

/// A class-teacher holds period 0 on every day or on none.
fn homeroom_continuity(model: &mut Model, problem: &Problem, x: &AssignmentVars) {
    for (t, teacher) in problem.teachers().iter().enumerate() {
        if !teacher.class_teacher {
            continue;
        }
        for c in 0..problem.num_classes() {
            for d in 1..problem.week().num_days() {
                let same = LinearExpr::sum([x.get(0, c, 0, t)]).term(x.get(d, c, 0, t), -1);
                model.add_linear_constraint(ConstraintKind::HomeroomContinuity, same, Relation::Eq, 0);
            }
        }
    }
}

/// At most `cap` periods in any `cap + 1` consecutive periods of one teacher
/// in one class.
fn fatigue(model: &mut Model, x: &AssignmentVars, cap: u32) {
    let window = cap as usize + 1;
    for d in 0..x.week().num_days() {
        let periods = x.week().periods_for_day(d);
        if periods < window {
            continue;
        }
        for c in 0..x.num_classes() {
            for t in 0..x.num_teachers() {
                for start in 0..=periods - window {
                    let run = LinearExpr::sum((start..start + window).map(|p| x.get(d, c, p, t)));
                    model.add_linear_constraint(ConstraintKind::Fatigue, run, Relation::Le, i64::from(cap));
                }
            }
        }
    }
}

/// Common teachers give exactly their limit to every class; others at most.
fn weekly_limits(model: &mut Model, problem: &Problem, x: &AssignmentVars) {
    for (t, teacher) in problem.teachers().iter().enumerate() {
        let Some(limit) = teacher.weekly_limit else { continue };
        let relation = if teacher.common { Relation::Eq } else { Relation::Le };
        for c in 0..problem.num_classes() {
            model.add_linear_constraint(
                ConstraintKind::WeeklyLimit,
                x.class_total(t, c),
                relation,
                i64::from(limit),
            );
        }
    }
}

/// Fill slot by slot, trying a teacher first. The starting teacher rotates
/// with the slot so that early classes do not all grab the same teachers.
pub(crate) fn decision_strategy(model: &mut Model, x: &AssignmentVars) {
    let teachers = x.num_teachers();
    let mut order = Vec::with_capacity(x.week().num_cells(x.num_classes()) * teachers);
    for d in 0..x.week().num_days() {
        for c in 0..x.num_classes() {
            for p in 0..x.week().periods_for_day(d) {
                let offset = c + p + x.week().day_start(d);
                order.extend((0..teachers).map(|i| x.get(d, c, p, (offset + i) % teachers)));
            }
        }
    }
    model.add_decision_strategy(order, ValuePreference::Max);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{TeacherConfig, TimetableInput};

    /// Teachers as `(name, subject, limit, common, class teacher)`.
    fn problem(
        teachers: Vec<(&str, &str, Option<u32>, bool, bool)>,
        classes: u32,
        periods: u32,
    ) -> Problem {
        let input = TimetableInput {
            teachers: teachers
                .into_iter()
                .map(|(name, subject, limit, common, homeroom)| {
                    (
                        name.to_string(),
                        TeacherConfig {
                            subjects: vec![subject.to_string()],
                            weekly_period_limit: limit,
                            common_for_all_classes: Some(common),
                            class_teacher_preference: Some(homeroom),
                            period_preference: Vec::new(),
                        },
                    )
                })
                .collect(),
            num_classes: classes,
            num_periods: periods,
            required_subjects: Vec::new(),
            rules: Rules::default(),
            solver: Default::default(),
        };
        Problem::from_input(&input).unwrap()
    }

    #[test]
    fn test_variable_layout() {
        let p = problem(
            vec![("A", "Math", None, false, false), ("B", "Art", None, false, false)],
            2,
            3,
        );
        let compiled = compile(&p, &Rules::default());
        let x = &compiled.x;
        // 2 classes * (5 * 3 + 2) periods * 2 teachers
        assert_eq!(x.vars.len(), 68);
        assert_eq!(x.get(0, 0, 0, 0).index(), 0);
        assert_eq!(x.get(0, 0, 0, 1).index(), 1);
        assert_eq!(x.get(0, 1, 0, 0).index(), 6);
        assert_eq!(compiled.model.vars()[x.get(5, 1, 1, 1).index()].name, "x_5_1_1_1");
        assert_eq!(x.class_total(0, 1).terms().len(), 17);
        assert_eq!(x.teacher_total(1).terms().len(), 34);
    }

    #[test]
    fn test_constraint_counts() {
        let p = problem(
            vec![
                ("A", "Math", None, false, true),
                ("B", "Math", Some(4), false, false),
                ("C", "PE", Some(2), true, false),
            ],
            2,
            3,
        );
        let counts = compile(&p, &Rules::default()).model.count_by_kind();
        // slots: 17 per class
        assert_eq!(counts[&ConstraintKind::ExactlyOneTeacher], 34);
        assert_eq!(counts[&ConstraintKind::NoDoubleBooking], 17 * 3);
        // 5 full days of 3 periods exceed the cap of 2, Saturday has 2
        assert_eq!(counts[&ConstraintKind::DailySubjectCap], 5 * 2 * 2);
        // A and B are exclusive, C is common
        assert_eq!(counts[&ConstraintKind::ExclusivityLink], 2 * 2 * 2);
        assert_eq!(counts[&ConstraintKind::SubjectExclusivity], 2);
        assert_eq!(counts[&ConstraintKind::HomeroomContinuity], 2 * 5);
        // one window per full day per (class, teacher)
        assert_eq!(counts[&ConstraintKind::Fatigue], 5 * 2 * 3);
        assert_eq!(counts[&ConstraintKind::WeeklyLimit], 2 * 2);
    }

    #[test]
    fn test_relaxed_rules_drop_families() {
        let p = problem(
            vec![
                ("A", "Math", Some(3), false, true),
                ("B", "Art", None, false, true),
            ],
            1,
            4,
        );
        let rules = Rules {
            max_daily_subject_periods: None,
            max_consecutive_periods: None,
            homeroom_continuity: false,
            weekly_limits: false,
        };
        let counts = compile(&p, &rules).model.count_by_kind();
        assert!(!counts.contains_key(&ConstraintKind::DailySubjectCap));
        assert!(!counts.contains_key(&ConstraintKind::Fatigue));
        assert!(!counts.contains_key(&ConstraintKind::HomeroomContinuity));
        assert!(!counts.contains_key(&ConstraintKind::WeeklyLimit));
        // a single class never double-books
        assert!(!counts.contains_key(&ConstraintKind::NoDoubleBooking));
    }

    #[test]
    fn test_strategy_covers_every_assignment_once() {
        let p = problem(
            vec![
                ("A", "Math", None, false, false),
                ("B", "Art", None, false, false),
                ("C", "PE", None, false, false),
            ],
            2,
            2,
        );
        let compiled = compile(&p, &Rules::default());
        let strategy = &compiled.model.strategies()[0];
        let mut seen: Vec<_> = strategy.vars.iter().map(|v| v.index()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), compiled.x.vars.len());
        // second class starts one teacher later
        assert_eq!(strategy.vars[0], compiled.x.get(0, 0, 0, 0));
        assert_eq!(strategy.vars[2 * 3], compiled.x.get(0, 1, 0, 1));
    }
}
