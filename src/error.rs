use thiserror::Error;

/// Problems in the input configuration, detected before any solve attempt.
///
/// Every message names the offending value and what to change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no teachers configured; add at least one teacher")]
    NoTeachers,

    #[error("numClasses must be positive; configure at least one class")]
    NoClasses,

    #[error("numPeriods must be positive; configure at least one period per day")]
    NoPeriods,

    #[error("teacher '{teacher}' has no subjects; list at least one subject for them")]
    TeacherWithoutSubjects { teacher: String },

    #[error("subject '{subject}' has no eligible teacher; add a teacher for it or drop it from requiredSubjects")]
    UncoveredSubject { subject: String },

    #[error(
        "common teachers are pinned to {pinned} periods per class but a class only has {slots} periods a week; lower their weeklyPeriodLimit"
    )]
    PinnedLoadExceedsWeek { pinned: u64, slots: u64 },

    #[error("{field} is {value} but at most {max} is supported; split the roster into smaller schools")]
    TooLarge {
        field: &'static str,
        value: u64,
        max: u64,
    },
}

/// Failures inside a solve backend. The pipeline reports these as UNKNOWN.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("model has no variables")]
    EmptyModel,

    #[error("HiGHS backend failed: {0}")]
    Highs(String),
}
