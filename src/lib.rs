//! Course timetabling engine.
//!
//! Sessions (lectures and labs) are assigned to time slots, faculty and rooms
//! in two stages: a backtracking constraint solver ([`csp`]) finds a timetable
//! without faculty, room or student clashes, and a genetic optimizer
//! ([`optimizer`]) then lowers the soft penalty of back-to-back teaching.
//! [`solver::solve`] runs the whole pipeline; [`server`] exposes it over HTTP.

pub mod config;
pub mod csp;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod optimizer;
pub mod server;
pub mod solver;

pub use config::{OptimizerConfig, SolveOptions};
pub use error::ScheduleError;
pub use solver::solve;
