//! Viztrail: contenedor de ramas de un proyecto.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::{BranchHandle, BranchProvenance, WorkflowAction};
use crate::constants::PROPERTY_NAME;
use crate::errors::CoreEngineError;
use crate::module::ModuleHandle;
use crate::sync::{read, write};

#[derive(Debug)]
pub struct ViztrailHandle {
    identifier: Uuid,
    exec_env_id: String,
    created_at: DateTime<Utc>,
    properties: RwLock<BTreeMap<String, Value>>,
    branches: RwLock<IndexMap<Uuid, Arc<BranchHandle>>>,
    default_branch: RwLock<Option<Uuid>>,
}

impl ViztrailHandle {
    pub fn new(exec_env_id: impl Into<String>, properties: BTreeMap<String, Value>) -> Self {
        Self { identifier: Uuid::new_v4(),
               exec_env_id: exec_env_id.into(),
               created_at: Utc::now(),
               properties: RwLock::new(properties),
               branches: RwLock::new(IndexMap::new()),
               default_branch: RwLock::new(None) }
    }

    /// Viztrail con una primera rama vacía (la rama por defecto) llamada `branch_name`.
    pub fn with_default_branch(exec_env_id: impl Into<String>,
                               properties: BTreeMap<String, Value>,
                               branch_name: &str)
                               -> Self {
        let viztrail = Self::new(exec_env_id, properties);
        let mut props = BTreeMap::new();
        props.insert(PROPERTY_NAME.to_string(), Value::String(branch_name.to_string()));
        let branch = Arc::new(BranchHandle::new(props, BranchProvenance::default()));
        viztrail.insert_branch(branch, true);
        viztrail
    }

    pub fn identifier(&self) -> Uuid { self.identifier }
    pub fn exec_env_id(&self) -> &str { &self.exec_env_id }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn properties(&self) -> BTreeMap<String, Value> { read(&self.properties).clone() }

    pub fn name(&self) -> Option<String> {
        read(&self.properties).get(PROPERTY_NAME).and_then(Value::as_str).map(str::to_string)
    }

    pub fn set_name(&self, name: impl Into<String>) {
        write(&self.properties).insert(PROPERTY_NAME.to_string(), Value::String(name.into()));
    }

    /// Crea una rama. Con `modules` la rama arranca con un snapshot `Create`
    /// que comparte esos módulos; ninguno puede estar activo. La primera rama
    /// del viztrail pasa a ser la rama por defecto.
    pub fn create_branch(&self,
                         properties: BTreeMap<String, Value>,
                         provenance: BranchProvenance,
                         modules: Option<Vec<Arc<ModuleHandle>>>,
                         is_default: bool)
                         -> Result<Arc<BranchHandle>, CoreEngineError> {
        let branch = Arc::new(BranchHandle::new(properties, provenance));
        if let Some(modules) = modules {
            branch.append_completed_workflow(modules, WorkflowAction::Create, None)?;
        }
        self.insert_branch(branch.clone(), is_default);
        Ok(branch)
    }

    fn insert_branch(&self, branch: Arc<BranchHandle>, is_default: bool) {
        let branch_id = branch.identifier();
        write(&self.branches).insert(branch_id, branch);
        let mut default = write(&self.default_branch);
        if is_default || default.is_none() {
            *default = Some(branch_id);
        }
        info!("viztrail {} branch created {branch_id} (default={})",
              self.identifier,
              *default == Some(branch_id));
    }

    pub fn get_branch(&self, branch_id: &Uuid) -> Option<Arc<BranchHandle>> { read(&self.branches).get(branch_id).cloned() }

    pub fn has_branch(&self, branch_id: &Uuid) -> bool { read(&self.branches).contains_key(branch_id) }

    /// Ramas en orden de creación.
    pub fn list_branches(&self) -> Vec<Arc<BranchHandle>> { read(&self.branches).values().cloned().collect() }

    /// Borra la rama y toda su historia. `Ok(false)` si no existe; la rama
    /// por defecto no se puede borrar hasta designar otra.
    pub fn delete_branch(&self, branch_id: &Uuid) -> Result<bool, CoreEngineError> {
        if *read(&self.default_branch) == Some(*branch_id) {
            return Err(CoreEngineError::DefaultBranch(*branch_id));
        }
        let removed = write(&self.branches).shift_remove(branch_id).is_some();
        if removed {
            debug!("viztrail {} branch deleted {branch_id}", self.identifier);
        }
        Ok(removed)
    }

    pub fn default_branch(&self) -> Option<Arc<BranchHandle>> {
        let id = (*read(&self.default_branch))?;
        self.get_branch(&id)
    }

    pub fn set_default_branch(&self, branch_id: &Uuid) -> Result<Arc<BranchHandle>, CoreEngineError> {
        let branch = self.get_branch(branch_id).ok_or(CoreEngineError::UnknownBranch(*branch_id))?;
        *write(&self.default_branch) = Some(*branch_id);
        Ok(branch)
    }
}
