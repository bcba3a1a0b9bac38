use thiserror::Error;
use viz_core::CoreEngineError;
use viz_persistence::PersistenceError;

/// Error de nivel aplicación: agrega los errores de los crates miembros.
#[derive(Debug, Error)]
pub enum VizflowError {
    #[error("engine error: {0}")]
    Engine(#[from] CoreEngineError),
    #[error("storage error: {0}")]
    Storage(#[from] PersistenceError),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl VizflowError {
    pub fn is_conflict(&self) -> bool { matches!(self, Self::Engine(e) if e.is_conflict()) }
}
