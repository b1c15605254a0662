//! Fast necessary-condition checks run before any model is built.
//!
//! Passing does not make the full model satisfiable; failing proves it is not.

use crate::data::{Diagnostic, PrecheckOutput, Remedy};
use log::{info, warn};

/// Coarse ceiling on how many periods one teacher can give one class.
const MAX_PERIODS_PER_CLASS: u64 = 2;

/// Slot counts computed by a passing check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub slots_needed: u64,
    pub slots_available: u64,
}

fn capacity(num_teachers: u64, num_classes: u64, num_periods: u64) -> Capacity {
    Capacity {
        slots_needed: num_classes * num_periods,
        slots_available: num_teachers * MAX_PERIODS_PER_CLASS * num_classes,
    }
}

/// Runs both checks. Pure: the same input always yields the same result.
pub fn check(
    num_teachers: usize,
    num_classes: usize,
    num_periods: usize,
) -> Result<Capacity, Diagnostic> {
    let (teachers, classes, periods) = (num_teachers as u64, num_classes as u64, num_periods as u64);
    info!(
        "Analyzing parameters: {} classes, {} periods, {} teachers",
        classes, periods, teachers
    );

    if teachers < classes {
        let diagnostic = Diagnostic::InsufficientTeachers {
            num_teachers: teachers,
            num_classes: classes,
            min_teachers: classes,
        };
        warn!("{}", diagnostic);
        return Err(diagnostic);
    }

    let cap = capacity(teachers, classes, periods);
    info!(
        "Teaching slots needed: {}, available: {}",
        cap.slots_needed, cap.slots_available
    );
    if cap.slots_available < cap.slots_needed {
        let per_teacher = MAX_PERIODS_PER_CLASS * classes;
        let diagnostic = Diagnostic::InsufficientCapacity {
            slots_needed: cap.slots_needed,
            slots_available: cap.slots_available,
            remedies: vec![
                Remedy::RaiseTeachers {
                    to: cap.slots_needed.div_ceil(per_teacher),
                },
                Remedy::LowerClasses {
                    to: cap.slots_available / periods.max(1),
                },
                Remedy::RaisePeriods,
            ],
        };
        warn!("{}", diagnostic);
        return Err(diagnostic);
    }

    info!("Parameter check passed");
    Ok(cap)
}

/// Pre-check result in its serializable form.
pub fn report(num_teachers: usize, num_classes: usize, num_periods: usize) -> PrecheckOutput {
    let cap = capacity(num_teachers as u64, num_classes as u64, num_periods as u64);
    let diagnostic = check(num_teachers, num_classes, num_periods).err();
    PrecheckOutput {
        passed: diagnostic.is_none(),
        slots_needed: cap.slots_needed,
        slots_available: cap.slots_available,
        diagnostic,
    }
}
