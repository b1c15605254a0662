use crate::compiler::compile;
use crate::data::{
    BackendKind, Diagnostic, PrecheckOutput, SolveStats, SolveStatus, SolverSettings,
    TimetableInput, TimetableOutput,
};
use crate::engine::SearchEngine;
use crate::error::ConfigError;
use crate::ilp::HighsBackend;
use crate::model::{Backend, Model, SolveOutcome};
use crate::objective;
use crate::precheck;
use crate::problem::{Problem, Week};
use crate::timetable::Timetable;
use crate::validation::audit;
use log::{info, trace, warn};
use std::time::{Duration, Instant};

const INFEASIBLE_ADVICE: &str =
    "no timetable satisfies every rule; relax weeklyPeriodLimit values or maxConsecutivePeriods and retry";
const UNKNOWN_ADVICE: &str =
    "no timetable found within the time budget; extend timeBudgetSecs or relax rules and retry";

/// Solves the weekly timetable.
///
/// Configuration problems are returned as errors. Everything else, including
/// a failed pre-check or a backend failure, is a status in the output.
pub fn solve(input: &TimetableInput) -> Result<TimetableOutput, ConfigError> {
    let start = Instant::now();
    let problem = Problem::from_input(input)?;
    info!(
        "Solving week: {} teachers, {} classes, {} periods ({} per class per week)",
        problem.num_teachers(),
        problem.num_classes(),
        problem.num_periods(),
        problem.week().slots_per_week()
    );

    if let Err(diagnostic) = precheck::check(
        problem.num_teachers(),
        problem.num_classes(),
        problem.num_periods(),
    ) {
        return Ok(rejected(problem.week(), problem.num_classes(), diagnostic, start));
    }

    let rules = &input.rules;
    let mut compiled = compile(&problem, rules);
    let load = objective::attach(&problem, rules, &mut compiled);
    trace!("Objective attached: {}", load.is_some());

    let budget = input.solver.budget();
    let backend = backend(&input.solver);
    let Outcome {
        mut outcome,
        backend,
    } = run(backend.as_ref(), &compiled.model, budget);

    let decoded = match &outcome.values {
        Some(values) if outcome.status.has_solution() => {
            Some(Timetable::decode(&compiled.x, values))
        }
        _ => None,
    };
    let timetable = match decoded {
        Some(timetable) => {
            let violations = audit(&problem, rules, &timetable);
            if violations.is_empty() {
                timetable
            } else {
                for violation in &violations {
                    warn!("{}", violation);
                }
                warn!(
                    "{} backend returned a timetable breaking {} rules; discarding it",
                    backend,
                    violations.len()
                );
                outcome = SolveOutcome::without_solution(SolveStatus::Unknown, outcome.nodes);
                Timetable::empty(problem.week(), problem.num_classes())
            }
        }
        None => Timetable::empty(problem.week(), problem.num_classes()),
    };

    let names = problem.teacher_names();
    let solved = outcome.status.has_solution();
    let output = TimetableOutput {
        status: outcome.status,
        diagnostic: None,
        advice: advice(outcome.status),
        objective: outcome.objective.filter(|_| solved),
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
    };
    info!(
        "Week solved with {} in {} ms",
        output.status, output.stats.elapsed_ms
    );
    Ok(output)
}

/// Runs only the capacity pre-check on a roster.
pub fn precheck(input: &TimetableInput) -> Result<PrecheckOutput, ConfigError> {
    let problem = Problem::from_input(input)?;
    Ok(precheck::report(
        problem.num_teachers(),
        problem.num_classes(),
        problem.num_periods(),
    ))
}

fn advice(status: SolveStatus) -> Option<String> {
    match status {
        SolveStatus::Infeasible => Some(INFEASIBLE_ADVICE.to_string()),
        SolveStatus::Unknown => Some(UNKNOWN_ADVICE.to_string()),
        SolveStatus::Optimal | SolveStatus::Feasible => None,
    }
}

/// Output for a configuration the pre-check ruled out: no solve, an empty
/// grid and the diagnostic.
pub(crate) fn rejected(
    week: &Week,
    num_classes: usize,
    diagnostic: Diagnostic,
    start: Instant,
) -> TimetableOutput {
    TimetableOutput {
        status: SolveStatus::Infeasible,
        advice: Some(diagnostic.to_string()),
        diagnostic: Some(diagnostic),
        objective: None,
        grid: Timetable::empty(week, num_classes).named_grid(&[]),
        periods_per_class: Default::default(),
        free_teachers: Vec::new(),
        stats: SolveStats {
            backend: "precheck".to_string(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            nodes: 0,
        },
    }
}

pub(crate) fn backend(settings: &SolverSettings) -> Box<dyn Backend> {
    match settings.backend {
        BackendKind::Search => Box::new(SearchEngine::new(settings.workers())),
        BackendKind::Highs => Box::new(HighsBackend::new(settings.workers())),
    }
}

pub(crate) struct Outcome {
    pub outcome: SolveOutcome,
    pub backend: &'static str,
}

/// Runs `backend`, turning a backend failure into UNKNOWN.
pub(crate) fn run(backend: &dyn Backend, model: &Model, budget: Duration) -> Outcome {
    let outcome = match backend.solve(model, budget) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("{} backend failed: {}", backend.name(), e);
            SolveOutcome::without_solution(SolveStatus::Unknown, 0)
        }
    };
    Outcome {
        outcome,
        backend: backend.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Rules, TeacherConfig};
    use std::collections::BTreeMap;

    fn input(teachers: &[(&str, &str)], classes: u32, periods: u32) -> TimetableInput {
        TimetableInput {
            teachers: teachers
                .iter()
                .map(|&(name, subject)| {
                    (
                        name.to_string(),
                        TeacherConfig {
                            subjects: vec![subject.to_string()],
                            ..Default::default()
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
            num_classes: classes,
            num_periods: periods,
            required_subjects: Vec::new(),
            rules: Rules::default(),
            solver: SolverSettings {
                time_budget_secs: 10.0,
                workers: 2,
                backend: BackendKind::Search,
            },
        }
    }

    #[test]
    fn test_precheck_failure_skips_the_solve() {
        let out = solve(&input(&[("A", "Math"), ("B", "Art")], 3, 9)).unwrap();
        assert_eq!(out.status, SolveStatus::Infeasible);
        assert_eq!(out.stats.backend, "precheck");
        assert!(out.advice.unwrap().contains("need at least 3 teachers"));
        assert_eq!(out.grid.len(), 6);
        assert!(out.grid.iter().flatten().flatten().all(Option::is_none));
        assert!(out.periods_per_class.is_empty());
    }

    #[test]
    fn test_config_errors_are_returned() {
        let mut config = input(&[("A", "Math")], 1, 2);
        config.required_subjects = vec!["Art".to_string()];
        assert!(matches!(
            solve(&config),
            Err(ConfigError::UncoveredSubject { .. })
        ));
        assert!(precheck(&config).is_err());
    }

    #[test]
    fn test_precheck_report() {
        let out = precheck(&input(&[("A", "Math"), ("B", "Art")], 3, 9)).unwrap();
        assert!(!out.passed);
        assert_eq!(out.slots_needed, 27);
    }

    #[test]
    fn test_advice_by_status() {
        assert!(advice(SolveStatus::Optimal).is_none());
        assert!(advice(SolveStatus::Infeasible).unwrap().contains("maxConsecutivePeriods"));
        assert!(advice(SolveStatus::Unknown).unwrap().contains("timeBudgetSecs"));
    }

    struct Failing;

    impl Backend for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn solve(&self, _: &Model, _: Duration) -> Result<SolveOutcome, crate::error::SolveError> {
            Err(crate::error::SolveError::Highs("boom".to_string()))
        }
    }

    #[test]
    fn test_backend_failure_is_unknown() {
        let Outcome { outcome, backend } = run(&Failing, &Model::new(), Duration::ZERO);
        assert_eq!(outcome.status, SolveStatus::Unknown);
        assert_eq!(backend, "failing");
    }
}
