//! Single-day model with anonymous teachers.
//!
//! Answers "can `n` interchangeable teachers cover `c` classes for `p`
//! periods" without any subject or weekly rules. Useful for sizing a staff
//! before a roster exists.

use crate::compiler::{AssignmentVars, decision_strategy, exactly_one_teacher, no_double_booking};
use crate::data::{CapacityInput, SolveStats, SolveStatus, TimetableOutput};
use crate::error::ConfigError;
use crate::model::{ConstraintKind, Model, Relation};
use crate::precheck;
use crate::problem::{Week, check_size};
use crate::solver::{self, Outcome};
use crate::timetable::Timetable;
use log::info;
use std::time::Instant;

/// Most periods an anonymous teacher gives one class in the day.
const PERIODS_PER_CLASS: i64 = 2;

pub fn solve(input: &CapacityInput) -> Result<TimetableOutput, ConfigError> {
    let start = Instant::now();
    if input.num_teachers == 0 {
        return Err(ConfigError::NoTeachers);
    }
    if input.num_classes == 0 {
        return Err(ConfigError::NoClasses);
    }
    if input.num_periods == 0 {
        return Err(ConfigError::NoPeriods);
    }
    check_size(
        input.num_teachers as u64,
        input.num_classes as u64,
        input.num_periods as u64,
    )?;
    let (teachers, classes, periods) = (
        input.num_teachers as usize,
        input.num_classes as usize,
        input.num_periods as usize,
    );
    let names: Vec<String> = (0..teachers).map(|t| format!("T{t}")).collect();
    let week = Week::single_day(periods);

    if let Err(diagnostic) = precheck::check(teachers, classes, periods) {
        return Ok(solver::rejected(&week, classes, diagnostic, start));
    }

    let mut model = Model::new();
    let x = AssignmentVars::create(&mut model, &week, classes, teachers);
    exactly_one_teacher(&mut model, &x);
    no_double_booking(&mut model, &x);
    for t in 0..teachers {
        for c in 0..classes {
            model.add_linear_constraint(
                ConstraintKind::ClassLoadCap,
                x.class_total(t, c),
                Relation::Le,
                PERIODS_PER_CLASS,
            );
        }
    }
    decision_strategy(&mut model, &x);
    info!(
        "Capacity model: {} variables, {} constraints",
        model.num_vars(),
        model.num_constraints()
    );

    let budget = input.solver.budget();
    let backend = solver::backend(&input.solver);
    let Outcome { outcome, backend } = solver::run(backend.as_ref(), &model, budget);

    let timetable = match &outcome.values {
        Some(values) if outcome.status.has_solution() => Timetable::decode(&x, values),
        _ => Timetable::empty(&week, classes),
    };
    let solved = outcome.status.has_solution();
    Ok(TimetableOutput {
        status: outcome.status,
        diagnostic: None,
        advice: (outcome.status == SolveStatus::Infeasible)
            .then(|| "add teachers or reduce periods".to_string()),
        objective: None,
        grid: timetable.named_grid(&names),
        periods_per_class: if solved {
            timetable.periods_per_class(&names)
        } else {
            Default::default()
        },
        free_teachers: if solved {
            timetable.free_teachers(&names)
        } else {
            Vec::new()
        },
        stats: SolveStats {
            backend: backend.to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            nodes: outcome.nodes,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Diagnostic, SolverSettings};

    fn input(teachers: u32, classes: u32, periods: u32) -> CapacityInput {
        CapacityInput {
            num_classes: classes,
            num_periods: periods,
            num_teachers: teachers,
            solver: SolverSettings {
                time_budget_secs: 10.0,
                workers: 2,
                ..SolverSettings::capacity()
            },
        }
    }

    #[test]
    fn test_small_day_is_solved() {
        let out = solve(&input(4, 2, 4)).unwrap();
        assert_eq!(out.status, SolveStatus::Optimal);
        assert_eq!(out.grid.len(), 1);
        assert_eq!(out.grid[0].len(), 2);
        for class in &out.grid[0] {
            assert!(class.iter().all(Option::is_some));
        }
        for (name, loads) in &out.periods_per_class {
            assert!(name.starts_with('T'));
            assert!(loads.iter().all(|&n| n <= 2));
        }
        assert_eq!(out.free_teachers.len(), 4);
        assert!(out.free_teachers.iter().all(|f| f.count == 2));
    }

    #[test]
    fn test_precheck_failure_short_circuits() {
        let out = solve(&input(2, 3, 9)).unwrap();
        assert_eq!(out.status, SolveStatus::Infeasible);
        assert!(matches!(
            out.diagnostic,
            Some(Diagnostic::InsufficientTeachers { min_teachers: 3, .. })
        ));
        assert!(out.grid[0].iter().flatten().all(Option::is_none));
    }

    #[test]
    fn test_zero_dimensions_are_config_errors() {
        assert_eq!(solve(&input(0, 1, 1)).unwrap_err(), ConfigError::NoTeachers);
        assert_eq!(solve(&input(1, 0, 1)).unwrap_err(), ConfigError::NoClasses);
    }

    #[test]
    fn test_oversized_dimensions_are_config_errors() {
        assert_eq!(
            solve(&input(4, 2, 1_000_000_000)).unwrap_err(),
            ConfigError::TooLarge {
                field: "numPeriods",
                value: 1_000_000_000,
                max: crate::problem::MAX_PERIODS
            }
        );
        assert!(matches!(
            solve(&input(u32::MAX, 2, 4)),
            Err(ConfigError::TooLarge { field: "number of teachers", .. })
        ));
    }
}
