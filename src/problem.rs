//! Immutable problem model: teachers, classes and the weekly period grid.
//!
//! All defaults of the roster's optional fields are resolved here, once.

use crate::data::{Rules, TimetableInput};
use crate::error::ConfigError;
use itertools::Itertools;
use std::collections::BTreeMap;

/// Days in a teaching week. The last one is a half day.
pub const DAYS_PER_WEEK: usize = 6;

pub type TeacherId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teacher {
    pub name: String,
    /// Sorted, without duplicates.
    pub subjects: Vec<String>,
    pub weekly_limit: Option<u32>,
    pub common: bool,
    pub class_teacher: bool,
    pub period_preference: Vec<u32>,
}

/// Shape of the period grid: how many periods each day has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Week {
    periods: Vec<usize>,
    day_start: Vec<usize>,
    total: usize,
}

impl Week {
    /// Full days of `num_periods`, with a final half day of
    /// `num_periods - num_periods / 2`.
    pub fn new(num_periods: usize) -> Self {
        let half = num_periods - num_periods / 2;
        let periods = (0..DAYS_PER_WEEK)
            .map(|d| if d == DAYS_PER_WEEK - 1 { half } else { num_periods })
            .collect();
        Self::from_periods(periods)
    }

    pub fn single_day(num_periods: usize) -> Self {
        Self::from_periods(vec![num_periods])
    }

    fn from_periods(periods: Vec<usize>) -> Self {
        let mut day_start = Vec::with_capacity(periods.len());
        let mut total = 0;
        for &p in &periods {
            day_start.push(total);
            total += p;
        }
        Self {
            periods,
            day_start,
            total,
        }
    }

    pub fn num_days(&self) -> usize {
        self.periods.len()
    }

    pub fn periods_for_day(&self, day: usize) -> usize {
        self.periods[day]
    }

    /// Number of periods before `day` starts.
    pub fn day_start(&self, day: usize) -> usize {
        self.day_start[day]
    }

    /// Periods per class per week.
    pub fn slots_per_week(&self) -> usize {
        self.total
    }

    /// Cells in a `[day][class][period]` grid of `num_classes` classes.
    pub fn num_cells(&self, num_classes: usize) -> usize {
        self.total * num_classes
    }

    /// Flat index of `(day, class, period)`; days are laid out one after the
    /// other, each day class by class.
    pub fn cell(&self, num_classes: usize, day: usize, class: usize, period: usize) -> usize {
        debug_assert!(class < num_classes && period < self.periods[day]);
        self.day_start[day] * num_classes + class * self.periods[day] + period
    }

    /// All `(day, period)` pairs in order.
    pub fn slots(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.periods
            .iter()
            .enumerate()
            .flat_map(|(d, &n)| (0..n).map(move |p| (d, p)))
    }
}

pub const MAX_TEACHERS: u64 = 500;
pub const MAX_CLASSES: u64 = 100;
pub const MAX_PERIODS: u64 = 16;

/// Rejects dimensions whose assignment grid would not fit in memory.
pub fn check_size(teachers: u64, classes: u64, periods: u64) -> Result<(), ConfigError> {
    for (field, value, max) in [
        ("number of teachers", teachers, MAX_TEACHERS),
        ("numClasses", classes, MAX_CLASSES),
        ("numPeriods", periods, MAX_PERIODS),
    ] {
        if value > max {
            return Err(ConfigError::TooLarge { field, value, max });
        }
    }
    Ok(())
}

/// The validated weekly problem.
#[derive(Debug, Clone)]
pub struct Problem {
    teachers: Vec<Teacher>,
    num_classes: usize,
    num_periods: usize,
    week: Week,
    subject_groups: BTreeMap<String, Vec<TeacherId>>,
}

impl Problem {
    pub fn from_input(input: &TimetableInput) -> Result<Self, ConfigError> {
        if input.teachers.is_empty() {
            return Err(ConfigError::NoTeachers);
        }
        if input.num_classes == 0 {
            return Err(ConfigError::NoClasses);
        }
        if input.num_periods == 0 {
            return Err(ConfigError::NoPeriods);
        }
        check_size(
            input.teachers.len() as u64,
            input.num_classes as u64,
            input.num_periods as u64,
        )?;

        let mut teachers = Vec::with_capacity(input.teachers.len());
        for (name, config) in &input.teachers {
            let subjects: Vec<String> = config
                .subjects
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .sorted()
                .dedup()
                .collect();
            if subjects.is_empty() {
                return Err(ConfigError::TeacherWithoutSubjects {
                    teacher: name.clone(),
                });
            }
            teachers.push(Teacher {
                name: name.clone(),
                subjects,
                weekly_limit: config.weekly_period_limit,
                common: config.common_for_all_classes.unwrap_or(false),
                class_teacher: config.class_teacher_preference.unwrap_or(false),
                period_preference: config.period_preference.clone(),
            });
        }

        let mut subject_groups: BTreeMap<String, Vec<TeacherId>> = teachers
            .iter()
            .enumerate()
            .flat_map(|(t, teacher)| teacher.subjects.iter().map(move |s| (s.clone(), t)))
            .into_group_map()
            .into_iter()
            .collect();
        for subject in &input.required_subjects {
            let subject = subject.trim();
            if !subject_groups.contains_key(subject) {
                return Err(ConfigError::UncoveredSubject {
                    subject: subject.to_string(),
                });
            }
        }
        for group in subject_groups.values_mut() {
            group.sort_unstable();
        }

        let num_periods = input.num_periods as usize;
        let week = Week::new(num_periods);

        if input.rules.weekly_limits {
            let pinned: u64 = teachers
                .iter()
                .filter(|t| t.common)
                .filter_map(|t| t.weekly_limit)
                .map(u64::from)
                .sum();
            let slots = week.slots_per_week() as u64;
            if pinned > slots {
                return Err(ConfigError::PinnedLoadExceedsWeek { pinned, slots });
            }
        }

        Ok(Self {
            teachers,
            num_classes: input.num_classes as usize,
            num_periods,
            week,
            subject_groups,
        })
    }

    pub fn teachers(&self) -> &[Teacher] {
        &self.teachers
    }

    pub fn teacher(&self, t: TeacherId) -> &Teacher {
        &self.teachers[t]
    }

    pub fn teacher_names(&self) -> Vec<String> {
        self.teachers.iter().map(|t| t.name.clone()).collect()
    }

    pub fn num_teachers(&self) -> usize {
        self.teachers.len()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Full-day period count as configured.
    pub fn num_periods(&self) -> usize {
        self.num_periods
    }

    pub fn week(&self) -> &Week {
        &self.week
    }

    pub fn subject_groups(&self) -> &BTreeMap<String, Vec<TeacherId>> {
        &self.subject_groups
    }

    /// Members of a subject group that fall under the one-teacher-per-class
    /// rule, i.e. everyone except common-for-all-classes teachers.
    pub fn exclusive_group(&self, subject: &str) -> Vec<TeacherId> {
        self.subject_groups
            .get(subject)
            .map(|group| {
                group
                    .iter()
                    .copied()
                    .filter(|&t| !self.teachers[t].common)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Weekly limit that is actually enforced under `rules`.
    pub fn enforced_limit(&self, t: TeacherId, rules: &Rules) -> Option<u32> {
        if rules.weekly_limits {
            self.teachers[t].weekly_limit
        } else {
            None
        }
    }

    /// Teachers whose load is left to the objective.
    pub fn unconstrained_teachers<'a>(
        &'a self,
        rules: &'a Rules,
    ) -> impl Iterator<Item = TeacherId> + 'a {
        (0..self.teachers.len()).filter(move |&t| self.enforced_limit(t, rules).is_none())
    }
}
