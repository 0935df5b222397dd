//! Error taxonomy shared by the engine and the planning use cases.

use thiserror::Error;

use crate::model::StopId;
use crate::solver::UnassignedReason;

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlannerError {
    /// A referenced id is absent from its repository.
    #[error("{entity} with id \"{id}\" not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stop cannot be placed in any vehicle's schedule.
    #[error("stop \"{stop_id}\" is infeasible: {reason}")]
    Infeasible {
        stop_id: StopId,
        reason: UnassignedReason,
    },

    /// The stored record changed since it was read. Re-read and retry.
    #[error("{entity} with id \"{id}\" was modified concurrently")]
    Conflict { entity: &'static str, id: String },
}

impl PlannerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Only version races can succeed on a retry with fresh data.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
