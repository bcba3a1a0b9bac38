//! Procesadores de comandos.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use viz_core::TaskResult;
use viz_domain::{DatasetContext, Datastore, ModuleCommand};

use crate::error::ProcessorError;

pub mod dataset;

pub use dataset::DatasetProcessor;

/// Ejecuta los comandos de un paquete.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    fn get_name(&self) -> &str;
    /// Paquete cuyos comandos atiende.
    fn package_id(&self) -> &str;

    /// Calcula el resultado del comando. `context` es el contexto de datasets
    /// que entra al módulo; el resultado debe traer el contexto de salida
    /// completo y la provenance (read/write) observada.
    async fn compute(&self, command: &ModuleCommand, context: &DatasetContext) -> Result<TaskResult, ProcessorError>;
}

/// Procesadores indexados por paquete.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn TaskProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self { Self::default() }

    /// Registro con el procesador del paquete `data`.
    pub fn with_builtin(datastore: Arc<dyn Datastore>) -> Self {
        Self::new().with(Arc::new(DatasetProcessor::new(datastore)))
    }

    pub fn with(mut self, processor: Arc<dyn TaskProcessor>) -> Self {
        self.register(processor);
        self
    }

    pub fn register(&mut self, processor: Arc<dyn TaskProcessor>) {
        self.processors.insert(processor.package_id().to_string(), processor);
    }

    pub fn get(&self, package_id: &str) -> Option<Arc<dyn TaskProcessor>> { self.processors.get(package_id).cloned() }

    pub fn len(&self) -> usize { self.processors.len() }
    pub fn is_empty(&self) -> bool { self.processors.is_empty() }

    pub async fn run(&self, command: &ModuleCommand, context: &DatasetContext) -> Result<TaskResult, ProcessorError> {
        let processor = self.get(&command.package_id)
                            .ok_or_else(|| ProcessorError::UnknownPackage(command.package_id.clone()))?;
        processor.compute(command, context).await
    }
}
