//! `Session`: un viztrail con su motor, backend y store configurados.
//!
//! Las ediciones de `Session` esperan a que la cabeza de la rama quede en
//! reposo, así que sirven igual con backends síncronos y asíncronos. Los
//! backends `async` y `queue` necesitan un runtime tokio activo.

use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
use viz_adapters::runtime::SETTLE_POLL;
use viz_adapters::{build_backend, BackendKind, EngineConfig, ProcessorRegistry};
use viz_core::{InMemoryModuleStore, ModuleStore, ProjectEngine, ViztrailHandle, WorkflowHandle};
use viz_domain::{InMemoryDatastore, ModuleCommand};
use viz_persistence::{FsModuleStore, StoreConfig};

use crate::errors::VizflowError;

pub struct Session {
    engine: Arc<ProjectEngine>,
    datastore: Arc<InMemoryDatastore>,
    backend: BackendKind,
    branch_id: Uuid,
}

impl Session {
    /// Sesión con store en memoria.
    pub fn in_memory(config: &EngineConfig) -> Result<Self, VizflowError> {
        Self::open(config, Arc::new(InMemoryModuleStore::new()))
    }

    /// Sesión que persiste cada módulo bajo `store.data_dir`.
    pub fn persistent(config: &EngineConfig, store: &StoreConfig) -> Result<Self, VizflowError> {
        Self::open(config, Arc::new(FsModuleStore::from_config(store)?))
    }

    pub fn open(config: &EngineConfig, store: Arc<dyn ModuleStore>) -> Result<Self, VizflowError> {
        let datastore = Arc::new(InMemoryDatastore::new());
        let processors = ProcessorRegistry::with_builtin(datastore.clone());
        let backend = build_backend(config.backend, processors)
            .map_err(|e| VizflowError::Runtime(format!("{} backend: {e}", config.backend)))?;
        let viztrail = Arc::new(ViztrailHandle::with_default_branch("local", BTreeMap::new(), &config.default_branch));
        let engine = ProjectEngine::builder(viztrail, backend).datastore(datastore.clone())
                                                              .module_store(store)
                                                              .build();
        let branch_id = engine.default_branch()
                              .map(|b| b.identifier())
                              .ok_or_else(|| VizflowError::NotFound("default branch".into()))?;
        info!("session opened backend={} branch={branch_id}", config.backend);
        Ok(Self { engine,
                  datastore,
                  backend: config.backend,
                  branch_id })
    }

    pub fn engine(&self) -> &Arc<ProjectEngine> { &self.engine }
    pub fn datastore(&self) -> &Arc<InMemoryDatastore> { &self.datastore }
    pub fn backend(&self) -> BackendKind { self.backend }
    pub fn branch_id(&self) -> Uuid { self.branch_id }

    /// Cabeza actual de la rama por defecto.
    pub fn head(&self) -> Option<Arc<WorkflowHandle>> { self.engine.get_branch(&self.branch_id).and_then(|b| b.head()) }

    /// Espera a que la cabeza deje de estar activa.
    pub async fn settle(&self) -> Option<Arc<WorkflowHandle>> { viz_adapters::settle(&self.engine, &self.branch_id).await }

    pub async fn append(&self, command: ModuleCommand) -> Result<Arc<WorkflowHandle>, VizflowError> {
        let edited = self.engine.append_workflow_module(&self.branch_id, command)?;
        self.finish(edited).await
    }

    pub async fn insert(&self, before: &Uuid, command: ModuleCommand) -> Result<Arc<WorkflowHandle>, VizflowError> {
        let edited = self.engine.insert_workflow_module(&self.branch_id, before, command)?;
        self.finish(edited).await
    }

    pub async fn replace(&self, module_id: &Uuid, command: ModuleCommand) -> Result<Arc<WorkflowHandle>, VizflowError> {
        let edited = self.engine.replace_workflow_module(&self.branch_id, module_id, command)?;
        self.finish(edited).await
    }

    pub async fn delete(&self, module_id: &Uuid) -> Result<Arc<WorkflowHandle>, VizflowError> {
        let edited = self.engine.delete_workflow_module(&self.branch_id, module_id)?;
        self.finish(edited).await
    }

    async fn finish(&self, edited: Option<Arc<WorkflowHandle>>) -> Result<Arc<WorkflowHandle>, VizflowError> {
        let workflow = edited.ok_or_else(|| VizflowError::NotFound("module or branch".into()))?;
        while workflow.is_active() {
            tokio::time::sleep(SETTLE_POLL).await;
        }
        Ok(workflow)
    }
}
