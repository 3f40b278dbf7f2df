//! Engine configuration: phase budgets, search workers and penalty weights.
//!
//! Configuration is plain JSON; every field is optional and falls back to
//! its default.
//!
//! ```
//! use timetable_solver::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{
//!     "phase1": { "timeLimitSecs": 10 },
//!     "weights": { "compactSchedule": 0.9 }
//! }"#).unwrap();
//!
//! assert_eq!(config.phase1.time_limit_secs, 10.0);
//! assert_eq!(config.phase2.time_limit_secs, 120.0);
//! assert_eq!(config.weights.compact_schedule, 0.9);
//! assert_eq!(config.weights.teacher_preference, 0.8);
//! ```

use crate::data::{ConstraintKind, WeightedConstraint};
use crate::error::{EngineError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Longest phase budget a configuration may ask for: one year.
pub const MAX_TIME_LIMIT_SECS: f64 = 365.0 * 24.0 * 3600.0;

/// Budget and parallelism of one solver run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhaseConfig {
    pub time_limit_secs: f64,
    pub workers: u32,
}

impl PhaseConfig {
    pub fn new(time_limit: Duration, workers: u32) -> Self {
        Self {
            time_limit_secs: time_limit.as_secs_f64(),
            workers,
        }
    }

    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_secs.max(0.0)).unwrap_or(Duration::MAX)
    }
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 60.0,
            workers: 1,
        }
    }
}

/// The five soft penalty families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyFamily {
    TeacherPreference,
    RoomFit,
    BalancedDistribution,
    CompactSchedule,
    ConsecutiveGrouping,
}

impl PenaltyFamily {
    pub const ALL: [PenaltyFamily; 5] = [
        PenaltyFamily::TeacherPreference,
        PenaltyFamily::RoomFit,
        PenaltyFamily::BalancedDistribution,
        PenaltyFamily::CompactSchedule,
        PenaltyFamily::ConsecutiveGrouping,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PenaltyFamily::TeacherPreference => "teacher_preference",
            PenaltyFamily::RoomFit => "room_fit",
            PenaltyFamily::BalancedDistribution => "balanced_distribution",
            PenaltyFamily::CompactSchedule => "compact_schedule",
            PenaltyFamily::ConsecutiveGrouping => "consecutive_grouping",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|family| family.name() == name)
    }
}

impl fmt::Display for PenaltyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Multipliers applied to each penalty family in the objective.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PenaltyWeights {
    pub teacher_preference: f64,
    pub room_fit: f64,
    pub balanced_distribution: f64,
    pub compact_schedule: f64,
    pub consecutive_grouping: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            teacher_preference: 0.8,
            room_fit: 0.6,
            balanced_distribution: 0.7,
            compact_schedule: 0.5,
            consecutive_grouping: 0.4,
        }
    }
}

impl PenaltyWeights {
    pub fn get(&self, family: PenaltyFamily) -> f64 {
        match family {
            PenaltyFamily::TeacherPreference => self.teacher_preference,
            PenaltyFamily::RoomFit => self.room_fit,
            PenaltyFamily::BalancedDistribution => self.balanced_distribution,
            PenaltyFamily::CompactSchedule => self.compact_schedule,
            PenaltyFamily::ConsecutiveGrouping => self.consecutive_grouping,
        }
    }

    fn slot(&mut self, family: PenaltyFamily) -> &mut f64 {
        match family {
            PenaltyFamily::TeacherPreference => &mut self.teacher_preference,
            PenaltyFamily::RoomFit => &mut self.room_fit,
            PenaltyFamily::BalancedDistribution => &mut self.balanced_distribution,
            PenaltyFamily::CompactSchedule => &mut self.compact_schedule,
            PenaltyFamily::ConsecutiveGrouping => &mut self.consecutive_grouping,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for family in PenaltyFamily::ALL {
            check_weight(family.name(), self.get(family))?;
        }
        Ok(())
    }

    /// Returns these weights overridden by the active soft constraints of a problem.
    ///
    /// Hard constraints are compiled in code, so hard entries only get logged.
    pub fn with_overrides(&self, constraints: &[WeightedConstraint]) -> Result<Self> {
        let mut weights = *self;
        for constraint in constraints.iter().filter(|c| c.is_active) {
            check_weight(&constraint.name, constraint.weight)?;
            match (constraint.kind, PenaltyFamily::from_name(&constraint.name)) {
                (ConstraintKind::Hard, _) => {
                    debug!(
                        "Hard constraint '{}' is built into the model; ignoring its entry.",
                        constraint.name
                    );
                }
                (ConstraintKind::Soft, Some(family)) => {
                    *weights.slot(family) = constraint.weight;
                }
                (ConstraintKind::Soft, None) => {
                    warn!("Unknown soft constraint '{}' ignored.", constraint.name);
                }
            }
        }
        Ok(weights)
    }
}

fn check_weight(name: &str, weight: f64) -> Result<()> {
    if (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(EngineError::InvalidWeight {
            name: name.to_string(),
            weight,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Feasibility phase: short and broad.
    pub phase1: PhaseConfig,
    /// Optimization phase: long and systematic.
    pub phase2: PhaseConfig,
    pub weights: PenaltyWeights,
    pub random_seed: i32,
    pub log_solver_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            phase1: PhaseConfig {
                time_limit_secs: 30.0,
                workers: 8,
            },
            phase2: PhaseConfig {
                time_limit_secs: 120.0,
                workers: 1,
            },
            weights: PenaltyWeights::default(),
            random_seed: 1234,
            log_solver_output: false,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_file(path)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, phase) in [("phase1", &self.phase1), ("phase2", &self.phase2)] {
            let secs = phase.time_limit_secs;
            if !secs.is_finite() || secs <= 0.0 || secs > MAX_TIME_LIMIT_SECS {
                return Err(EngineError::Config(format!(
                    "{name} time limit must be in (0, {MAX_TIME_LIMIT_SECS}] seconds, got {secs}"
                )));
            }
        }
        self.weights.validate()
    }
}
