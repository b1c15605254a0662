use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// One teacher record as it appears in the roster.
///
/// Optional fields stay optional here; defaults are resolved once when the
/// problem model is built.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherConfig {
    pub subjects: Vec<String>,
    #[serde(default, alias = "weekly_periods")]
    pub weekly_period_limit: Option<u32>,
    #[serde(default, alias = "common_for_all_classes")]
    pub common_for_all_classes: Option<bool>,
    #[serde(default, alias = "class_teacher_preference")]
    pub class_teacher_preference: Option<bool>,
    /// Reserved ordering hint, carried through but not constrained yet.
    #[serde(default, alias = "priod_preference")]
    pub period_preference: Vec<u32>,
}

/// Pedagogical rule switches. The defaults are the standard weekly rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rules {
    /// At most this many periods of one subject per class per day.
    pub max_daily_subject_periods: Option<u32>,
    /// At most this many periods in any run of `max + 1` consecutive periods
    /// for one teacher in one class.
    pub max_consecutive_periods: Option<u32>,
    pub homeroom_continuity: bool,
    pub weekly_limits: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            max_daily_subject_periods: Some(2),
            max_consecutive_periods: Some(2),
            homeroom_continuity: true,
            weekly_limits: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Built-in propagation and branch-and-bound search.
    #[default]
    Search,
    /// Integer program solved by HiGHS through good_lp.
    Highs,
}

/// How long and with how many workers to search.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverSettings {
    pub time_budget_secs: f64,
    pub workers: usize,
    pub backend: BackendKind,
}

/// Budgets are capped at one day.
const MAX_BUDGET_SECS: f64 = 86_400.0;
const MAX_WORKERS: usize = 64;

impl SolverSettings {
    /// Wall-clock budget. Negative or NaN budgets mean no time at all.
    pub fn budget(&self) -> Duration {
        Duration::from_secs_f64(self.time_budget_secs.max(0.0).min(MAX_BUDGET_SECS))
    }

    /// Worker threads, between 1 and 64.
    pub fn workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }

    /// Budget used by the single-day capacity model.
    pub fn capacity() -> Self {
        Self {
            time_budget_secs: 30.0,
            ..Self::default()
        }
    }
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_budget_secs: 300.0,
            workers: 8,
            backend: BackendKind::Search,
        }
    }
}

/// The complete input of a weekly solve.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableInput {
    pub teachers: BTreeMap<String, TeacherConfig>,
    pub num_classes: u32,
    pub num_periods: u32,
    #[serde(default)]
    pub required_subjects: Vec<String>,
    #[serde(default)]
    pub rules: Rules,
    #[serde(default)]
    pub solver: SolverSettings,
}

/// Input of the single-day capacity model with anonymous teachers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityInput {
    pub num_classes: u32,
    pub num_periods: u32,
    pub num_teachers: u32,
    #[serde(default = "SolverSettings::capacity")]
    pub solver: SolverSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Feasible,
    Infeasible,
    Unknown,
}

impl SolveStatus {
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A concrete change that would let the capacity check pass.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Remedy {
    RaiseTeachers { to: u64 },
    LowerClasses { to: u64 },
    RaisePeriods,
}

impl fmt::Display for Remedy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remedy::RaiseTeachers { to } => write!(f, "increase teachers to at least {to}"),
            Remedy::LowerClasses { to } => write!(f, "decrease classes to {to}"),
            Remedy::RaisePeriods => f.write_str("increase periods to spread the load"),
        }
    }
}

/// Structural infeasibility found by the pre-check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Diagnostic {
    #[serde(rename_all = "camelCase")]
    InsufficientTeachers {
        num_teachers: u64,
        num_classes: u64,
        min_teachers: u64,
    },
    #[serde(rename_all = "camelCase")]
    InsufficientCapacity {
        slots_needed: u64,
        slots_available: u64,
        remedies: Vec<Remedy>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::InsufficientTeachers {
                num_teachers,
                num_classes,
                min_teachers,
            } => write!(
                f,
                "not enough teachers: {num_teachers} teachers cannot cover {num_classes} classes simultaneously; need at least {min_teachers} teachers"
            ),
            Diagnostic::InsufficientCapacity {
                slots_needed,
                slots_available,
                remedies,
            } => {
                write!(
                    f,
                    "impossible configuration: need {slots_needed} slots but only {slots_available} available"
                )?;
                for (i, remedy) in remedies.iter().enumerate() {
                    write!(f, "; {}. {}", i + 1, remedy)?;
                }
                Ok(())
            }
        }
    }
}

/// Result of running only the feasibility pre-check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecheckOutput {
    pub passed: bool,
    pub slots_needed: u64,
    pub slots_available: u64,
    pub diagnostic: Option<Diagnostic>,
}

/// Teachers with nothing to teach during one slot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeTeachers {
    pub day: usize,
    pub period: usize,
    pub count: usize,
    pub teachers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveStats {
    pub backend: String,
    pub elapsed_ms: u64,
    pub nodes: u64,
}

/// The final output of a solve.
///
/// `grid[day][class][period]` holds the teacher's name, or `null` when no
/// assignment exists.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableOutput {
    pub status: SolveStatus,
    pub diagnostic: Option<Diagnostic>,
    pub advice: Option<String>,
    pub objective: Option<i64>,
    pub grid: Vec<Vec<Vec<Option<String>>>>,
    pub periods_per_class: BTreeMap<String, Vec<u32>>,
    pub free_teachers: Vec<FreeTeachers>,
    pub stats: SolveStats,
}
