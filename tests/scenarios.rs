use std::collections::BTreeMap;

use timetable_solver::compiler::compile;
use timetable_solver::data::{
    BackendKind, Diagnostic, Rules, SolveStatus, SolverSettings, TeacherConfig, TimetableInput,
    TimetableOutput,
};
use timetable_solver::objective;
use timetable_solver::problem::Problem;
use timetable_solver::solver::{precheck, solve};
use timetable_solver::timetable::Timetable;
use timetable_solver::validation::audit;

struct T {
    name: &'static str,
    subject: &'static str,
    limit: Option<u32>,
    common: bool,
    homeroom: bool,
}

fn t(name: &'static str, subject: &'static str) -> T {
    T {
        name,
        subject,
        limit: None,
        common: false,
        homeroom: false,
    }
}

fn input(teachers: Vec<T>, classes: u32, periods: u32, budget: f64) -> TimetableInput {
    TimetableInput {
        teachers: teachers
            .into_iter()
            .map(|t| {
                (
                    t.name.to_string(),
                    TeacherConfig {
                        subjects: vec![t.subject.to_string()],
                        weekly_period_limit: t.limit,
                        common_for_all_classes: Some(t.common),
                        class_teacher_preference: Some(t.homeroom),
                        period_preference: Vec::new(),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>(),
        num_classes: classes,
        num_periods: periods,
        required_subjects: Vec::new(),
        rules: Rules::default(),
        solver: SolverSettings {
            time_budget_secs: budget,
            workers: 4,
            backend: BackendKind::Search,
        },
    }
}

/// Rebuilds the timetable from the named grid and audits it.
fn assert_valid(input: &TimetableInput, out: &TimetableOutput) {
    let problem = Problem::from_input(input).unwrap();
    let names = problem.teacher_names();
    let mut timetable = Timetable::empty(problem.week(), problem.num_classes());
    for (d, classes) in out.grid.iter().enumerate() {
        for (c, periods) in classes.iter().enumerate() {
            for (p, cell) in periods.iter().enumerate() {
                let name = cell.as_ref().expect("solved grid has no empty cell");
                let teacher = names.iter().position(|n| n == name).unwrap();
                timetable.assign(d, c, p, teacher);
            }
        }
    }
    let violations = audit(&problem, &input.rules, &timetable);
    assert!(violations.is_empty(), "{violations:?}");
}

fn assert_solved(out: &TimetableOutput) {
    assert!(
        matches!(out.status, SolveStatus::Optimal | SolveStatus::Feasible),
        "unexpected status {}",
        out.status
    );
}

#[test]
fn test_too_few_teachers_is_reported() {
    let config = input(vec![t("A", "Math"), t("B", "English")], 3, 9, 5.0);
    let out = solve(&config).unwrap();
    assert_eq!(out.status, SolveStatus::Infeasible);
    assert_eq!(
        out.diagnostic,
        Some(Diagnostic::InsufficientTeachers {
            num_teachers: 2,
            num_classes: 3,
            min_teachers: 3,
        })
    );
    assert!(out.grid.iter().flatten().flatten().all(Option::is_none));
    assert_eq!(precheck(&config).unwrap(), precheck(&config).unwrap());
}

#[test]
fn test_two_teachers_two_classes_is_optimal() {
    let config = input(vec![t("A", "Math"), t("B", "Math")], 2, 2, 20.0);
    let out = solve(&config).unwrap();
    assert_eq!(out.status, SolveStatus::Optimal);
    // 11 periods per class, split evenly
    assert_eq!(out.objective, Some(22));
    assert_valid(&config, &out);
    let mut loads: Vec<_> = out.periods_per_class.values().cloned().collect();
    loads.sort();
    assert_eq!(loads, vec![vec![0, 11], vec![11, 0]]);
    assert!(out.free_teachers.iter().all(|f| f.count == 0));
}

#[test]
fn test_common_teacher_gets_exact_limit() {
    let mut pe = t("C", "PE");
    pe.limit = Some(2);
    pe.common = true;
    let config = input(vec![t("A", "Math"), t("B", "English"), pe], 2, 3, 20.0);
    let out = solve(&config).unwrap();
    assert_eq!(out.status, SolveStatus::Optimal);
    // 30 periods left to A and B, split evenly
    assert_eq!(out.objective, Some(30));
    assert_valid(&config, &out);
    assert_eq!(out.periods_per_class["C"], vec![2, 2]);
}

#[test]
fn test_homeroom_teacher_holds_every_first_period() {
    let teachers = [("A", "Math"), ("B", "English"), ("C", "Science")]
        .into_iter()
        .map(|(name, subject)| T {
            homeroom: true,
            ..t(name, subject)
        })
        .collect();
    let config = input(teachers, 2, 3, 20.0);
    let out = solve(&config).unwrap();
    assert_eq!(out.status, SolveStatus::Optimal);
    // 34 periods over three teachers: 11, 11 and 12
    assert_eq!(out.objective, Some(33));
    assert_valid(&config, &out);
    for c in 0..2 {
        let first = &out.grid[0][c][0];
        for day in &out.grid {
            assert_eq!(&day[c][0], first);
        }
    }
}

#[test]
fn test_required_subject_without_load_is_infeasible() {
    let mut a = t("A", "Math");
    a.limit = Some(0);
    let mut b = t("B", "Math");
    b.limit = Some(0);
    let mut config = input(vec![a, b, t("C", "English"), t("D", "English")], 2, 2, 10.0);
    config.required_subjects = vec!["Math".to_string()];
    let out = solve(&config).unwrap();
    assert_eq!(out.status, SolveStatus::Infeasible);
    assert!(out.diagnostic.is_none());
    assert!(out.advice.unwrap().contains("weeklyPeriodLimit"));
    assert!(out.grid.iter().flatten().flatten().all(Option::is_none));
}

#[test]
fn test_highs_backend_agrees() {
    let mut config = input(vec![t("A", "Math"), t("B", "Math")], 2, 2, 20.0);
    config.solver.backend = BackendKind::Highs;
    let out = solve(&config).unwrap();
    assert_solved(&out);
    assert_eq!(out.stats.backend, "highs");
    assert_eq!(out.objective, Some(22));
    assert_valid(&config, &out);
}

#[test]
fn test_demo_roster_compiles() {
    let text = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/roster.json"))
        .unwrap();
    let config: TimetableInput = serde_json::from_str(&text).unwrap();
    assert_eq!(config.teachers.len(), 30);
    assert_eq!(config.teachers["pe"].weekly_period_limit, Some(2));
    assert_eq!(config.teachers["library"].common_for_all_classes, Some(true));

    let report = precheck(&config).unwrap();
    assert!(report.passed);
    assert_eq!(report.slots_needed, 90);

    let problem = Problem::from_input(&config).unwrap();
    let mut compiled = compile(&problem, &config.rules);
    let load = objective::attach(&problem, &config.rules, &mut compiled).unwrap();
    assert_eq!(load.teachers.len(), 27);
    // 10 classes * 50 periods * 30 teachers assignment variables
    assert!(compiled.model.num_vars() > 15_000);
}
