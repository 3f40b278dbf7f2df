use crate::data::{PeriodId, RoomId, TeacherId, UnitId};
use thiserror::Error;

/// Failures that abort a solve before the solver runs.
///
/// Infeasible problems and exhausted time limits are not errors; they come
/// back as unsuccessful outcomes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown teaching unit {0}")]
    UnknownUnit(UnitId),

    #[error("unknown time period {0}")]
    UnknownPeriod(PeriodId),

    #[error("unknown teacher {0}")]
    UnknownTeacher(TeacherId),

    #[error("unknown room {0}")]
    UnknownRoom(RoomId),

    #[error("weight {weight} of constraint '{name}' is outside [0, 1]")]
    InvalidWeight { name: String, weight: f64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
