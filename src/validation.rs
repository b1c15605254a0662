//! Independent re-check of a decoded timetable against the weekly rules.
//!
//! Works on the grid alone, so it catches encoding mistakes in the compiler
//! and wrong answers from a backend alike.

use crate::data::Rules;
use crate::problem::Problem;
use crate::timetable::Timetable;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    ExactlyOneTeacher,
    NoDoubleBooking,
    DailySubjectCap,
    SubjectExclusivity,
    HomeroomContinuity,
    Fatigue,
    WeeklyLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub rule: Rule,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.rule, self.message)
    }
}

/// Returns every violation found, in rule order. Empty means valid.
pub fn audit(problem: &Problem, rules: &Rules, timetable: &Timetable) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut report = |rule: Rule, message: String| violations.push(Violation { rule, message });
    let week = timetable.week();
    let classes = timetable.num_classes();
    let names = problem.teacher_names();

    if timetable.collisions() > 0 {
        report(
            Rule::ExactlyOneTeacher,
            format!("{} cells hold more than one teacher", timetable.collisions()),
        );
    }
    for d in 0..week.num_days() {
        for c in 0..classes {
            for p in 0..week.periods_for_day(d) {
                if timetable.get(d, c, p).is_none() {
                    report(
                        Rule::ExactlyOneTeacher,
                        format!("day {d} class {c} period {p} has no teacher"),
                    );
                }
            }
        }
    }

    for (d, p) in week.slots() {
        let mut busy = HashSet::new();
        for c in 0..classes {
            if let Some(t) = timetable.get(d, c, p)
                && !busy.insert(t)
            {
                report(
                    Rule::NoDoubleBooking,
                    format!("{} is in two classes on day {d} period {p}", names[t]),
                );
            }
        }
    }

    if let Some(cap) = rules.max_daily_subject_periods {
        for (subject, group) in problem.subject_groups() {
            for d in 0..week.num_days() {
                for c in 0..classes {
                    let taught = (0..week.periods_for_day(d))
                        .filter(|&p| timetable.get(d, c, p).is_some_and(|t| group.contains(&t)))
                        .count();
                    if taught > cap as usize {
                        report(
                            Rule::DailySubjectCap,
                            format!("class {c} has {taught} periods of {subject} on day {d}"),
                        );
                    }
                }
            }
        }
    }

    for subject in problem.subject_groups().keys() {
        let group = problem.exclusive_group(subject);
        if group.is_empty() {
            continue;
        }
        for c in 0..classes {
            let teaching = group
                .iter()
                .filter(|&&t| timetable.class_load(t, c) > 0)
                .count();
            if teaching != 1 {
                report(
                    Rule::SubjectExclusivity,
                    format!("class {c} has {teaching} teachers for {subject}"),
                );
            }
        }
    }

    if rules.homeroom_continuity {
        for (t, teacher) in problem.teachers().iter().enumerate() {
            if !teacher.class_teacher {
                continue;
            }
            for c in 0..classes {
                let first = timetable.get(0, c, 0) == Some(t);
                if let Some(d) =
                    (1..week.num_days()).find(|&d| (timetable.get(d, c, 0) == Some(t)) != first)
                {
                    let (held, missed) = if first { (0, d) } else { (d, 0) };
                    report(
                        Rule::HomeroomContinuity,
                        format!(
                            "{} holds period 0 of class {c} on day {held} but not on day {missed}",
                            teacher.name
                        ),
                    );
                }
            }
        }
    }

    if let Some(cap) = rules.max_consecutive_periods {
        let window = cap as usize + 1;
        for d in 0..week.num_days() {
            let periods = week.periods_for_day(d);
            for c in 0..classes {
                for start in 0..periods.saturating_sub(window - 1) {
                    let run: Vec<_> = (start..start + window)
                        .map(|p| timetable.get(d, c, p))
                        .collect();
                    for (t, name) in names.iter().enumerate() {
                        let count = run.iter().filter(|&&cell| cell == Some(t)).count();
                        if count > cap as usize {
                            report(
                                Rule::Fatigue,
                                format!("{name} teaches class {c} {count} times in periods {start}..{} of day {d}", start + window),
                            );
                        }
                    }
                }
            }
        }
    }

    if rules.weekly_limits {
        for (t, teacher) in problem.teachers().iter().enumerate() {
            let Some(limit) = teacher.weekly_limit else { continue };
            for c in 0..classes {
                let load = timetable.class_load(t, c);
                let broken = if teacher.common { load != limit } else { load > limit };
                if broken {
                    report(
                        Rule::WeeklyLimit,
                        format!("{} gives class {c} {load} periods against a limit of {limit}", teacher.name),
                    );
                }
            }
        }
    }

    violations
}
