//! Snapshots inmutables de workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use viz_domain::{DatasetContext, ModuleCommand};

use crate::module::{ModuleHandle, ModuleState};

/// Acción de edición que produjo un snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowAction {
    Create,
    Append,
    Insert,
    Delete,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDescriptor {
    pub identifier: Uuid,
    pub action: WorkflowAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Un punto de la historia de una rama. La lista de módulos no cambia
/// después de crearse; los módulos se comparten con otros snapshots.
#[derive(Debug)]
pub struct WorkflowHandle {
    descriptor: WorkflowDescriptor,
    command: Option<ModuleCommand>,
    modules: Vec<Arc<ModuleHandle>>,
}

impl WorkflowHandle {
    pub fn new(action: WorkflowAction, command: Option<&ModuleCommand>, modules: Vec<Arc<ModuleHandle>>) -> Self {
        let descriptor = WorkflowDescriptor { identifier: Uuid::new_v4(),
                                              action,
                                              package_id: command.map(|c| c.package_id.clone()),
                                              command_id: command.map(|c| c.command_id.clone()),
                                              created_at: Utc::now() };
        Self { descriptor,
               command: command.cloned(),
               modules }
    }

    pub fn identifier(&self) -> Uuid { self.descriptor.identifier }
    pub fn descriptor(&self) -> &WorkflowDescriptor { &self.descriptor }
    pub fn action(&self) -> WorkflowAction { self.descriptor.action }
    pub fn command(&self) -> Option<&ModuleCommand> { self.command.as_ref() }
    pub fn modules(&self) -> &[Arc<ModuleHandle>] { &self.modules }
    pub fn len(&self) -> usize { self.modules.len() }
    pub fn is_empty(&self) -> bool { self.modules.is_empty() }

    /// Activo si algún módulo está `Pending` o `Running`.
    pub fn is_active(&self) -> bool { self.modules.iter().any(|m| m.is_active()) }

    /// Estado agregado: Error > Canceled > Running > Pending > Success.
    pub fn state(&self) -> ModuleState {
        let states: Vec<ModuleState> = self.modules.iter().map(|m| m.state()).collect();
        [ModuleState::Error, ModuleState::Canceled, ModuleState::Running, ModuleState::Pending]
            .into_iter()
            .find(|s| states.contains(s))
            .unwrap_or(ModuleState::Success)
    }

    /// Posición del módulo, buscando desde el final.
    pub fn position(&self, module_id: &Uuid) -> Option<usize> {
        self.modules.iter().rposition(|m| m.identifier() == *module_id)
    }

    pub fn get_module(&self, module_id: &Uuid) -> Option<&Arc<ModuleHandle>> {
        self.position(module_id).map(|i| &self.modules[i])
    }

    /// Contexto de datasets que entra en la posición `index`.
    pub fn context_before(&self, index: usize) -> DatasetContext { context_at(&self.modules, index) }
}

pub(crate) fn context_at(modules: &[Arc<ModuleHandle>], index: usize) -> DatasetContext {
    match index.checked_sub(1).and_then(|i| modules.get(i)) {
        Some(previous) => previous.datasets(),
        None => DatasetContext::new(),
    }
}
