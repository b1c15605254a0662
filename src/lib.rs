//! Weekly school timetable solver.
//!
//! A roster of teachers is validated into a [`problem::Problem`], compiled
//! into a linear model over boolean assignment variables and handed to a
//! [`model::Backend`]. The default backend is the built-in parallel search in
//! [`engine`]; [`ilp`] solves the same model with HiGHS.

pub mod capacity;
pub mod compiler;
pub mod data;
pub mod engine;
pub mod error;
pub mod ilp;
pub mod model;
pub mod objective;
pub mod precheck;
pub mod problem;
pub mod server;
pub mod solver;
pub mod timetable;
pub mod validation;
