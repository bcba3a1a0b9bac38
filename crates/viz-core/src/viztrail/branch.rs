//! Ramas: secuencias append-only de snapshots.
//!
//! El `Mutex` de la lista de workflows es el ámbito de exclusión por rama:
//! ediciones y callbacks toman `BranchHandle::lock` durante todo su ciclo
//! leer-modificar-añadir y lo sueltan antes de despachar al backend.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use uuid::Uuid;
use viz_domain::ModuleCommand;

use super::{WorkflowAction, WorkflowHandle};
use crate::constants::PROPERTY_NAME;
use crate::errors::CoreEngineError;
use crate::module::ModuleHandle;
use crate::sync::{lock, read, write};

/// Origen de una rama creada a partir de otra.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchProvenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<Uuid>,
}

#[derive(Debug)]
pub struct BranchHandle {
    identifier: Uuid,
    created_at: DateTime<Utc>,
    provenance: BranchProvenance,
    properties: RwLock<BTreeMap<String, Value>>,
    workflows: Mutex<Vec<Arc<WorkflowHandle>>>,
}

impl BranchHandle {
    pub fn new(properties: BTreeMap<String, Value>, provenance: BranchProvenance) -> Self {
        Self { identifier: Uuid::new_v4(),
               created_at: Utc::now(),
               provenance,
               properties: RwLock::new(properties),
               workflows: Mutex::new(Vec::new()) }
    }

    pub fn identifier(&self) -> Uuid { self.identifier }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn provenance(&self) -> &BranchProvenance { &self.provenance }
    pub fn properties(&self) -> BTreeMap<String, Value> { read(&self.properties).clone() }

    pub fn name(&self) -> Option<String> {
        read(&self.properties).get(PROPERTY_NAME).and_then(Value::as_str).map(str::to_string)
    }

    pub fn set_name(&self, name: impl Into<String>) {
        write(&self.properties).insert(PROPERTY_NAME.to_string(), Value::String(name.into()));
    }

    /// Toma el ámbito de exclusión de la rama.
    pub fn lock(&self) -> BranchGuard<'_> {
        BranchGuard { branch_id: self.identifier,
                      workflows: lock(&self.workflows) }
    }

    pub fn head(&self) -> Option<Arc<WorkflowHandle>> { self.lock().head() }

    /// Historia completa, en orden de creación.
    pub fn workflows(&self) -> Vec<Arc<WorkflowHandle>> { self.lock().workflows().to_vec() }

    pub fn get_workflow(&self, workflow_id: &Uuid) -> Option<Arc<WorkflowHandle>> {
        self.lock().workflows().iter().find(|w| w.identifier() == *workflow_id).cloned()
    }

    pub fn append_pending_workflow(&self,
                                   prefix: Vec<Arc<ModuleHandle>>,
                                   pending: Vec<Arc<ModuleHandle>>,
                                   action: WorkflowAction,
                                   command: &ModuleCommand)
                                   -> Result<Arc<WorkflowHandle>, CoreEngineError> {
        self.lock().append_pending_workflow(prefix, pending, action, command)
    }

    pub fn append_completed_workflow(&self,
                                     modules: Vec<Arc<ModuleHandle>>,
                                     action: WorkflowAction,
                                     command: Option<&ModuleCommand>)
                                     -> Result<Arc<WorkflowHandle>, CoreEngineError> {
        self.lock().append_completed_workflow(modules, action, command)
    }
}

/// Vista exclusiva sobre la historia de una rama.
pub struct BranchGuard<'a> {
    branch_id: Uuid,
    workflows: MutexGuard<'a, Vec<Arc<WorkflowHandle>>>,
}

impl BranchGuard<'_> {
    pub fn branch_id(&self) -> Uuid { self.branch_id }
    pub fn head(&self) -> Option<Arc<WorkflowHandle>> { self.workflows.last().cloned() }
    pub fn workflows(&self) -> &[Arc<WorkflowHandle>] { &self.workflows }

    /// Cabeza editable: `Err` si está activa, `None` si la rama está vacía.
    pub fn editable_head(&self) -> Result<Option<Arc<WorkflowHandle>>, CoreEngineError> {
        match self.head() {
            Some(head) if head.is_active() => Err(CoreEngineError::ActiveWorkflow(self.branch_id)),
            head => Ok(head),
        }
    }

    /// Añade `prefix ++ pending` como nueva cabeza.
    pub fn append_pending_workflow(&mut self,
                                   prefix: Vec<Arc<ModuleHandle>>,
                                   pending: Vec<Arc<ModuleHandle>>,
                                   action: WorkflowAction,
                                   command: &ModuleCommand)
                                   -> Result<Arc<WorkflowHandle>, CoreEngineError> {
        self.editable_head()?;
        let mut modules = prefix;
        modules.extend(pending);
        Ok(self.push(WorkflowHandle::new(action, Some(command), modules)))
    }

    /// Añade un snapshot que no requiere ejecución; ningún módulo puede estar activo.
    pub fn append_completed_workflow(&mut self,
                                     modules: Vec<Arc<ModuleHandle>>,
                                     action: WorkflowAction,
                                     command: Option<&ModuleCommand>)
                                     -> Result<Arc<WorkflowHandle>, CoreEngineError> {
        self.editable_head()?;
        if let Some(active) = modules.iter().find(|m| m.is_active()) {
            return Err(CoreEngineError::Internal(format!("module {} is still active", active.identifier())));
        }
        Ok(self.push(WorkflowHandle::new(action, command, modules)))
    }

    fn push(&mut self, workflow: WorkflowHandle) -> Arc<WorkflowHandle> {
        let workflow = Arc::new(workflow);
        debug!("branch {} head -> workflow {} ({:?}, {} modules)",
               self.branch_id,
               workflow.identifier(),
               workflow.action(),
               workflow.len());
        self.workflows.push(workflow.clone());
        workflow
    }
}
