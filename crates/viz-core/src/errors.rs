//! Errores específicos del core.
//!
//! "No encontrado" nunca es un error: las operaciones devuelven `None`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::module::ModuleState;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreEngineError {
    #[error("branch {0} has an active workflow")] ActiveWorkflow(Uuid),
    #[error("invalid module state transition {from} -> {to}")] InvalidTransition { from: ModuleState, to: ModuleState },
    #[error("branch {0} is the default branch")] DefaultBranch(Uuid),
    #[error("unknown branch {0}")] UnknownBranch(Uuid),
    #[error("persistence failure: {0}")] Persistence(String),
    #[error("internal: {0}")] Internal(String),
}

impl CoreEngineError {
    /// Operación rechazada sin corromper estado (edición concurrente o estado de origen incorrecto).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ActiveWorkflow(_) | Self::InvalidTransition { .. })
    }
}
