//! Builder del `ProjectEngine`.

use std::sync::Arc;
use viz_domain::{Datastore, InMemoryDatastore, PackageRegistry};

use super::{Backend, ProjectEngine};
use crate::store::{InMemoryModuleStore, ModuleStore};
use crate::viztrail::ViztrailHandle;

/// Colaboradores opcionales con valores en memoria por defecto.
pub struct ProjectEngineBuilder {
    viztrail: Arc<ViztrailHandle>,
    backend: Arc<dyn Backend>,
    datastore: Option<Arc<dyn Datastore>>,
    store: Option<Arc<dyn ModuleStore>>,
    packages: Option<PackageRegistry>,
}

impl ProjectEngineBuilder {
    pub fn new(viztrail: Arc<ViztrailHandle>, backend: Arc<dyn Backend>) -> Self {
        Self { viztrail,
               backend,
               datastore: None,
               store: None,
               packages: None }
    }

    pub fn datastore(mut self, datastore: Arc<dyn Datastore>) -> Self {
        self.datastore = Some(datastore);
        self
    }

    pub fn module_store(mut self, store: Arc<dyn ModuleStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn packages(mut self, packages: PackageRegistry) -> Self {
        self.packages = Some(packages);
        self
    }

    pub fn build(self) -> Arc<ProjectEngine> {
        ProjectEngine::new(self.viztrail,
                           self.backend,
                           self.datastore.unwrap_or_else(|| Arc::new(InMemoryDatastore::new())),
                           self.store.unwrap_or_else(|| Arc::new(InMemoryModuleStore::new())),
                           self.packages.unwrap_or_else(PackageRegistry::with_builtin))
    }
}
