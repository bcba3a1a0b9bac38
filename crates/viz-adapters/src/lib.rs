//! viz-adapters: backends de ejecución y procesadores de comandos.
//!
//! Este crate provee:
//! - `TaskProcessor`: trait async que calcula el resultado de un comando
//!   sobre el contexto de datasets que recibe.
//! - `DatasetProcessor`: procesador de referencia del paquete `data`.
//! - Tres `Backend` del core: `SynchronousBackend` (en línea, RUNNING),
//!   `TokioBackend` (tareas tokio abortables, PENDING) y `QueueBackend`
//!   (cola consumida por workers externos, PENDING).
//! - `EngineConfig`: selección de backend desde el entorno, y
//!   `build_backend`/`settle` para montarlo y esperar a las ramas.

pub mod backends;
pub mod config;
pub mod error;
pub mod processor;
pub mod runtime;

pub use backends::{QueueBackend, QueueWorker, QueuedTask, SynchronousBackend, TokioBackend};
pub use config::{BackendKind, EngineConfig};
pub use error::ProcessorError;
pub use processor::{DatasetProcessor, ProcessorRegistry, TaskProcessor};
pub use runtime::{build_backend, settle};
