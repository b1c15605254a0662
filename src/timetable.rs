//! Decoded solution grid and the summaries derived from it.

use crate::compiler::AssignmentVars;
use crate::data::FreeTeachers;
use crate::problem::{TeacherId, Week};
use std::collections::BTreeMap;

/// Teacher per `(day, class, period)`, or `None` for an empty cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timetable {
    week: Week,
    num_classes: usize,
    cells: Vec<Option<TeacherId>>,
    /// Cells where the solution set more than one teacher. A verified
    /// solution never has any.
    collisions: usize,
}

impl Timetable {
    pub fn empty(week: &Week, num_classes: usize) -> Self {
        Self {
            week: week.clone(),
            num_classes,
            cells: vec![None; week.num_cells(num_classes)],
            collisions: 0,
        }
    }

    /// Reads the assignment grid back from solver values.
    pub fn decode(x: &AssignmentVars, values: &[i64]) -> Self {
        let mut timetable = Self::empty(x.week(), x.num_classes());
        for d in 0..x.week().num_days() {
            for c in 0..x.num_classes() {
                for p in 0..x.week().periods_for_day(d) {
                    for t in 0..x.num_teachers() {
                        if values[x.get(d, c, p, t).index()] == 1 {
                            timetable.assign(d, c, p, t);
                        }
                    }
                }
            }
        }
        timetable
    }

    /// Sets a cell. A second teacher in the same cell is kept out and counted.
    pub fn assign(&mut self, day: usize, class: usize, period: usize, teacher: TeacherId) {
        let cell = &mut self.cells[self.week.cell(self.num_classes, day, class, period)];
        match cell {
            Some(_) => self.collisions += 1,
            None => *cell = Some(teacher),
        }
    }

    pub fn get(&self, day: usize, class: usize, period: usize) -> Option<TeacherId> {
        self.cells[self.week.cell(self.num_classes, day, class, period)]
    }

    pub fn week(&self) -> &Week {
        &self.week
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Periods `teacher` gives `class` over the week.
    pub fn class_load(&self, teacher: TeacherId, class: usize) -> u32 {
        self.week
            .slots()
            .filter(|&(d, p)| self.get(d, class, p) == Some(teacher))
            .count() as u32
    }

    /// `grid[day][class][period]` with teacher names.
    pub fn named_grid(&self, names: &[String]) -> Vec<Vec<Vec<Option<String>>>> {
        (0..self.week.num_days())
            .map(|d| {
                (0..self.num_classes)
                    .map(|c| {
                        (0..self.week.periods_for_day(d))
                            .map(|p| self.get(d, c, p).map(|t| names[t].clone()))
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }

    /// Weekly periods of every teacher, one entry per class.
    pub fn periods_per_class(&self, names: &[String]) -> BTreeMap<String, Vec<u32>> {
        names
            .iter()
            .enumerate()
            .map(|(t, name)| {
                let loads = (0..self.num_classes).map(|c| self.class_load(t, c)).collect();
                (name.clone(), loads)
            })
            .collect()
    }

    /// Teachers not teaching anywhere, per `(day, period)`.
    pub fn free_teachers(&self, names: &[String]) -> Vec<FreeTeachers> {
        self.week
            .slots()
            .map(|(d, p)| {
                let mut busy = vec![false; names.len()];
                for c in 0..self.num_classes {
                    if let Some(t) = self.get(d, c, p) {
                        busy[t] = true;
                    }
                }
                let teachers: Vec<String> = names
                    .iter()
                    .zip(&busy)
                    .filter(|(_, busy)| !**busy)
                    .map(|(name, _)| name.clone())
                    .collect();
                FreeTeachers {
                    day: d,
                    period: p,
                    count: teachers.len(),
                    teachers,
                }
            })
            .collect()
    }
}
