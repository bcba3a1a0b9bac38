//! Errores de persistencia.
//! Mapea errores de E/S y de serde a variantes semánticas.

use std::io::ErrorKind;
use thiserror::Error;
use viz_core::CoreEngineError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("not found")]
    NotFound,
    #[error("corrupted document {path}: {reason}")]
    Corrupted { path: String, reason: String },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("transient IO error: {0}")]
    TransientIo(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl PersistenceError {
    /// Errores transitorios: vale la pena reintentar con backoff.
    pub fn is_retryable(&self) -> bool { matches!(self, Self::TransientIo(_)) }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => Self::TransientIo(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self { Self::Serialization(err.to_string()) }
}

impl From<PersistenceError> for CoreEngineError {
    fn from(err: PersistenceError) -> Self { CoreEngineError::Persistence(err.to_string()) }
}
