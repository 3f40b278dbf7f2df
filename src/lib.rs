//! Weekly school timetable construction on a MILP solver.
//!
//! A [`Problem`] collects teaching units, periods, teachers, class groups and
//! rooms. The [`Engine`] places every unit in exactly one period without
//! double-booking anyone, minimising weighted soft penalties, and reports the
//! quality of what it found.

pub mod backend;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod penalties;
pub mod problem;
pub mod sample;
pub mod scoring;
pub mod solver;
pub mod strategy;
pub mod validation;

pub use backend::SolveStatus;
pub use config::{EngineConfig, PenaltyFamily, PenaltyWeights, PhaseConfig};
pub use error::{EngineError, Result};
pub use problem::Problem;
pub use solver::{Engine, PhaseMetrics, SolveOutcome, TwoPhaseOutcome};
pub use strategy::{StrategyComparison, compare_strategies};
