//! Contrato de persistencia de módulos y una implementación en memoria.

use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::CoreEngineError;
use crate::module::ModuleRecord;

/// Escritura de registros de módulo.
///
/// Cada transición de estado llama a `write`; un `Err` fuerza al módulo a
/// `Error` (ver `ModuleHandle`).
pub trait ModuleStore: Send + Sync {
    /// Persiste (o reemplaza) el registro del módulo.
    fn write(&self, module: &ModuleRecord) -> Result<(), CoreEngineError>;
    /// Último registro persistido del módulo.
    fn read(&self, identifier: &Uuid) -> Option<ModuleRecord>;
}

#[derive(Debug, Default)]
pub struct InMemoryModuleStore {
    inner: DashMap<Uuid, ModuleRecord>,
}

impl InMemoryModuleStore {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.inner.len() }
    pub fn is_empty(&self) -> bool { self.inner.is_empty() }
}

impl ModuleStore for InMemoryModuleStore {
    fn write(&self, module: &ModuleRecord) -> Result<(), CoreEngineError> {
        self.inner.insert(module.identifier, module.clone());
        Ok(())
    }
    fn read(&self, identifier: &Uuid) -> Option<ModuleRecord> { self.inner.get(identifier).map(|r| r.value().clone()) }
}
