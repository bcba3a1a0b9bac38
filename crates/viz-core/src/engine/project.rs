//! `ProjectEngine`: orquestador de un viztrail.
//!
//! Todas las ediciones (append/insert/delete/replace) y todos los callbacks
//! del backend toman el ámbito de la rama (`BranchHandle::lock`), leen la
//! cabeza, aplican cambios y registran la tarea siguiente; el despacho al
//! backend ocurre siempre después de soltar el ámbito, de modo que un backend
//! síncrono puede llamar a los callbacks en línea sin bloquearse.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use uuid::Uuid;
use viz_domain::{DatasetContext, Datastore, ModuleCommand, PackageRegistry};

use super::{Backend, ProjectEngineBuilder, TaskHandle, TaskRegistry, TaskResult, WorkflowController};
use crate::errors::CoreEngineError;
use crate::model::ModuleOutputs;
use crate::module::{ModuleHandle, ModuleRecord, ModuleState};
use crate::store::ModuleStore;
use crate::viztrail::{BranchHandle, BranchProvenance, ViztrailHandle, WorkflowAction, WorkflowHandle};

/// Punto de otra rama desde el que se crea una rama nueva.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchSource {
    pub branch_id: Uuid,
    /// Snapshot de origen; la cabeza si es `None`.
    pub workflow_id: Option<Uuid>,
    /// Último módulo incluido; todos si es `None`.
    pub module_id: Option<Uuid>,
}

struct Dispatch {
    task: TaskHandle,
    command: ModuleCommand,
    context: DatasetContext,
}

pub struct ProjectEngine {
    viztrail: Arc<ViztrailHandle>,
    backend: Arc<dyn Backend>,
    datastore: Arc<dyn Datastore>,
    store: Arc<dyn ModuleStore>,
    packages: PackageRegistry,
    tasks: TaskRegistry,
    self_ref: Weak<ProjectEngine>,
}

impl ProjectEngine {
    #[inline]
    pub fn builder(viztrail: Arc<ViztrailHandle>, backend: Arc<dyn Backend>) -> ProjectEngineBuilder {
        ProjectEngineBuilder::new(viztrail, backend)
    }

    pub(crate) fn new(viztrail: Arc<ViztrailHandle>,
                      backend: Arc<dyn Backend>,
                      datastore: Arc<dyn Datastore>,
                      store: Arc<dyn ModuleStore>,
                      packages: PackageRegistry)
                      -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self { viztrail,
                                          backend,
                                          datastore,
                                          store,
                                          packages,
                                          tasks: TaskRegistry::new(),
                                          self_ref: self_ref.clone() })
    }

    pub fn viztrail(&self) -> &Arc<ViztrailHandle> { &self.viztrail }
    pub fn datastore(&self) -> &Arc<dyn Datastore> { &self.datastore }
    pub fn packages(&self) -> &PackageRegistry { &self.packages }
    pub fn tasks(&self) -> &TaskRegistry { &self.tasks }

    pub fn get_branch(&self, branch_id: &Uuid) -> Option<Arc<BranchHandle>> { self.viztrail.get_branch(branch_id) }

    pub fn default_branch(&self) -> Option<Arc<BranchHandle>> { self.viztrail.default_branch() }

    // ---------------------------------------------------------------------
    // Ediciones estructurales
    // ---------------------------------------------------------------------

    /// Añade un módulo al final de la cabeza de la rama.
    pub fn append_workflow_module(&self,
                                  branch_id: &Uuid,
                                  command: ModuleCommand)
                                  -> Result<Option<Arc<WorkflowHandle>>, CoreEngineError> {
        let Some(branch) = self.viztrail.get_branch(branch_id) else {
            return Ok(None);
        };
        let mut guard = branch.lock();
        let prefix = guard.editable_head()?.map(|h| h.modules().to_vec()).unwrap_or_default();
        let index = prefix.len();
        let context = crate::viztrail::context_at(&prefix, index);
        let pending = vec![self.new_module(&command, &context, None)];
        let workflow = guard.append_pending_workflow(prefix, pending, WorkflowAction::Append, &command)?;
        let dispatch = self.start(&workflow, index, context, *branch_id);
        drop(guard);
        self.dispatch(dispatch);
        Ok(Some(workflow))
    }

    /// Inserta un módulo antes de `before_module_id`; los módulos siguientes
    /// quedan pendientes como candidatos a omitirse.
    pub fn insert_workflow_module(&self,
                                  branch_id: &Uuid,
                                  before_module_id: &Uuid,
                                  command: ModuleCommand)
                                  -> Result<Option<Arc<WorkflowHandle>>, CoreEngineError> {
        let Some(branch) = self.viztrail.get_branch(branch_id) else {
            return Ok(None);
        };
        let mut guard = branch.lock();
        let Some(head) = guard.editable_head()? else {
            return Ok(None);
        };
        let Some(index) = head.position(before_module_id) else {
            return Ok(None);
        };
        let context = head.context_before(index);
        let mut pending = vec![self.new_module(&command, &context, None)];
        pending.extend(head.modules()[index..].iter().map(|m| self.carry_forward(m)));
        let workflow =
            guard.append_pending_workflow(head.modules()[..index].to_vec(), pending, WorkflowAction::Insert, &command)?;
        let dispatch = self.start(&workflow, index, context, *branch_id);
        drop(guard);
        self.dispatch(dispatch);
        Ok(Some(workflow))
    }

    /// Reemplaza el comando de `module_id`. El módulo nuevo conserva los
    /// `resources` de la provenance del reemplazado.
    pub fn replace_workflow_module(&self,
                                   branch_id: &Uuid,
                                   module_id: &Uuid,
                                   command: ModuleCommand)
                                   -> Result<Option<Arc<WorkflowHandle>>, CoreEngineError> {
        let Some(branch) = self.viztrail.get_branch(branch_id) else {
            return Ok(None);
        };
        let mut guard = branch.lock();
        let Some(head) = guard.editable_head()? else {
            return Ok(None);
        };
        let Some(index) = head.position(module_id) else {
            return Ok(None);
        };
        let context = head.context_before(index);
        let resources = head.modules()[index].provenance().resources;
        let mut pending = vec![self.new_module(&command, &context, resources)];
        pending.extend(head.modules()[index + 1..].iter().map(|m| self.carry_forward(m)));
        let workflow =
            guard.append_pending_workflow(head.modules()[..index].to_vec(), pending, WorkflowAction::Replace, &command)?;
        let dispatch = self.start(&workflow, index, context, *branch_id);
        drop(guard);
        self.dispatch(dispatch);
        Ok(Some(workflow))
    }

    /// Elimina `module_id`. Los módulos siguientes cuyo read-set no cambia se
    /// resuelven en el acto; si ninguno necesita ejecutarse el snapshot nuevo
    /// nace completo.
    pub fn delete_workflow_module(&self,
                                  branch_id: &Uuid,
                                  module_id: &Uuid)
                                  -> Result<Option<Arc<WorkflowHandle>>, CoreEngineError> {
        let Some(branch) = self.viztrail.get_branch(branch_id) else {
            return Ok(None);
        };
        let mut guard = branch.lock();
        let Some(head) = guard.editable_head()? else {
            return Ok(None);
        };
        let Some(index) = head.position(module_id) else {
            return Ok(None);
        };
        let command = head.modules()[index].command();
        let remaining: Vec<Arc<ModuleHandle>> = head.modules()
                                                    .iter()
                                                    .enumerate()
                                                    .filter(|(i, _)| *i != index)
                                                    .map(|(_, m)| m.clone())
                                                    .collect();
        let mut context = crate::viztrail::context_at(&remaining, index);
        let mut resolved = remaining[..index].to_vec();
        let mut cursor = index;
        while cursor < remaining.len() {
            let module = &remaining[cursor];
            let provenance = module.provenance();
            if provenance.requires_exec(&context) {
                break;
            }
            let entering = context;
            context = provenance.adjust_state(&entering, self.datastore.as_ref());
            let skipped = self.skipped_copy(module, &entering, &context);
            cursor += 1;
            let failed = !skipped.is_success();
            resolved.push(skipped);
            if failed {
                resolved.extend(remaining[cursor..].iter().map(|m| self.canceled_copy(m)));
                cursor = remaining.len();
            }
        }
        if cursor == remaining.len() {
            info!("delete on branch {branch_id} resolved without execution");
            return guard.append_completed_workflow(resolved, WorkflowAction::Delete, Some(&command))
                        .map(Some);
        }
        let next = &remaining[cursor];
        let mut pending = vec![self.new_module(&next.command(), &context, next.provenance().resources)];
        pending.extend(remaining[cursor + 1..].iter().map(|m| self.carry_forward(m)));
        let workflow = guard.append_pending_workflow(resolved, pending, WorkflowAction::Delete, &command)?;
        let dispatch = self.start(&workflow, cursor, context, *branch_id);
        drop(guard);
        self.dispatch(dispatch);
        Ok(Some(workflow))
    }

    /// Cancela la ejecución en curso de la rama. `None` si la rama no existe
    /// o su cabeza no está activa.
    pub fn cancel_exec(&self, branch_id: &Uuid) -> Option<Arc<WorkflowHandle>> {
        let branch = self.viztrail.get_branch(branch_id)?;
        let guard = branch.lock();
        let head = guard.head()?;
        if !head.is_active() {
            return None;
        }
        self.cancel_active(branch_id, &head);
        info!("branch {branch_id} execution canceled (workflow {})", head.identifier());
        Some(head)
    }

    // ---------------------------------------------------------------------
    // Ramas
    // ---------------------------------------------------------------------

    /// Crea una rama vacía o a partir de un punto de otra rama; la rama nueva
    /// comparte los módulos de origen. `Ok(None)` si el origen no existe.
    pub fn create_branch(&self,
                         source: Option<BranchSource>,
                         properties: BTreeMap<String, Value>)
                         -> Result<Option<Arc<BranchHandle>>, CoreEngineError> {
        let Some(source) = source else {
            return self.viztrail
                       .create_branch(properties, BranchProvenance::default(), None, false)
                       .map(Some);
        };
        let Some(parent) = self.viztrail.get_branch(&source.branch_id) else {
            return Ok(None);
        };
        let workflow = match source.workflow_id {
            Some(id) => match parent.get_workflow(&id) {
                Some(w) => Some(w),
                None => return Ok(None),
            },
            None => parent.head(),
        };
        let mut provenance = BranchProvenance { source_branch: Some(source.branch_id),
                                                workflow_id: None,
                                                module_id: source.module_id };
        let modules = match &workflow {
            Some(w) => {
                provenance.workflow_id = Some(w.identifier());
                match source.module_id {
                    Some(id) => match w.position(&id) {
                        Some(i) => Some(w.modules()[..=i].to_vec()),
                        None => return Ok(None),
                    },
                    None => Some(w.modules().to_vec()),
                }
            }
            None if source.module_id.is_some() => return Ok(None),
            None => None,
        };
        if modules.iter().flatten().any(|m| m.is_active()) {
            return Err(CoreEngineError::ActiveWorkflow(source.branch_id));
        }
        self.viztrail.create_branch(properties, provenance, modules, false).map(Some)
    }

    /// Borra una rama. Si su cabeza seguía activa, las tareas se cancelan en
    /// el backend y sus módulos quedan CANCELED.
    pub fn delete_branch(&self, branch_id: &Uuid) -> Result<bool, CoreEngineError> {
        let branch = self.viztrail.get_branch(branch_id);
        if !self.viztrail.delete_branch(branch_id)? {
            return Ok(false);
        }
        if let Some(branch) = branch {
            let guard = branch.lock();
            if let Some(head) = guard.head().filter(|h| h.is_active()) {
                self.cancel_active(branch_id, &head);
            }
        }
        Ok(true)
    }

    // ---------------------------------------------------------------------
    // Internos
    // ---------------------------------------------------------------------

    fn next_state(&self) -> ModuleState {
        match self.backend.next_task_state() {
            ModuleState::Running => ModuleState::Running,
            _ => ModuleState::Pending,
        }
    }

    fn new_module(&self,
                  command: &ModuleCommand,
                  context: &DatasetContext,
                  resources: Option<BTreeMap<String, Value>>)
                  -> Arc<ModuleHandle> {
        let external_form = self.packages.to_external_form(command, context);
        let mut record = ModuleRecord::new(command.clone(), external_form, self.next_state());
        record.provenance.resources = resources;
        ModuleHandle::create(record, self.store.clone())
    }

    fn carry_forward(&self, module: &ModuleHandle) -> Arc<ModuleHandle> {
        ModuleHandle::create(module.snapshot().carry_forward(), self.store.clone())
    }

    fn skipped_copy(&self, module: &ModuleHandle, entering: &DatasetContext, datasets: &DatasetContext) -> Arc<ModuleHandle> {
        let mut record = module.snapshot().carry_forward();
        record.external_form = self.packages.to_external_form(&record.command, entering);
        record.state = ModuleState::Success;
        record.timestamp.finish(None);
        record.datasets = datasets.clone();
        debug!("module {} resolved by provenance as {}", module.identifier(), record.identifier);
        ModuleHandle::create(record, self.store.clone())
    }

    fn canceled_copy(&self, module: &ModuleHandle) -> Arc<ModuleHandle> {
        let mut record = module.snapshot().carry_forward();
        record.state = ModuleState::Canceled;
        record.timestamp.finish(None);
        record.datasets = DatasetContext::new();
        record.outputs = ModuleOutputs::default();
        ModuleHandle::create(record, self.store.clone())
    }

    /// Registra la tarea del módulo recién creado en `index`.
    fn start(&self, workflow: &WorkflowHandle, index: usize, context: DatasetContext, branch_id: Uuid) -> Option<Dispatch> {
        let module = &workflow.modules()[index];
        if !module.is_active() {
            // la creación no pudo persistirse
            self.cancel_pending(workflow, index + 1);
            return None;
        }
        Some(self.register(branch_id, module, module.external_form(), context))
    }

    fn register(&self, branch_id: Uuid, module: &ModuleHandle, external_form: String, context: DatasetContext) -> Dispatch {
        let task = TaskHandle::new(self.viztrail.identifier(), branch_id, module.identifier(), external_form);
        self.tasks.register(task.clone());
        Dispatch { task,
                   command: module.command(),
                   context }
    }

    /// Recorre los módulos pendientes desde `start`: omite los que no
    /// necesitan ejecutarse y se detiene en el primero que sí, que queda
    /// registrado para despacharse.
    fn advance(&self, workflow: &WorkflowHandle, start: usize, context: DatasetContext, branch_id: Uuid) -> Option<Dispatch> {
        let mut context = context;
        for (index, module) in workflow.modules().iter().enumerate().skip(start) {
            if !module.is_pending() {
                debug!("advance: module {} is {}; chain stops", module.identifier(), module.state());
                return None;
            }
            let provenance = module.provenance();
            if !provenance.requires_exec(&context) {
                context = provenance.adjust_state(&context, self.datastore.as_ref());
                if module.skip(context.clone()) != Ok(ModuleState::Success) {
                    self.cancel_pending(workflow, index + 1);
                    return None;
                }
                debug!("module {} skipped (inputs unchanged)", module.identifier());
                continue;
            }
            let external_form = self.packages.to_external_form(&module.command(), &context);
            if self.next_state() == ModuleState::Running
               && module.set_running(external_form.clone(), None) != Ok(ModuleState::Running)
            {
                self.cancel_pending(workflow, index + 1);
                return None;
            }
            return Some(self.register(branch_id, module, external_form, context));
        }
        None
    }

    /// Cancela en el backend las tareas de la rama y pasa a CANCELED los
    /// módulos activos de `head`. Requiere el guard de la rama.
    fn cancel_active(&self, branch_id: &Uuid, head: &WorkflowHandle) {
        for task in self.tasks.take_for_branch(branch_id) {
            debug!("cancel task {} (module {})", task.task_id, task.module_id);
            self.backend.cancel_task(&task.task_id);
        }
        for module in head.modules().iter().filter(|m| m.is_active()) {
            if let Err(e) = module.set_canceled(None, None) {
                warn!("cancel: module {}: {e}", module.identifier());
            }
        }
    }

    /// Cancela los módulos todavía pendientes desde `start`.
    fn cancel_pending(&self, workflow: &WorkflowHandle, start: usize) {
        for module in workflow.modules().iter().skip(start).filter(|m| m.is_pending()) {
            if let Err(e) = module.set_canceled(None, None) {
                warn!("cancel_pending: module {}: {e}", module.identifier());
            }
        }
    }

    fn dispatch(&self, dispatch: Option<Dispatch>) {
        let Some(Dispatch { task, command, context }) = dispatch else {
            return;
        };
        let Some(engine) = self.self_ref.upgrade() else {
            warn!("engine dropped; task {} not dispatched", task.task_id);
            return;
        };
        debug!("dispatch task={} module={} branch={} [{}]",
               task.task_id,
               task.module_id,
               task.branch_id,
               task.external_form);
        self.backend.execute_task(task, command, context, engine);
    }

    fn finish_task(&self,
                   task_id: &Uuid,
                   to: ModuleState,
                   finished_at: Option<DateTime<Utc>>,
                   outputs: Option<ModuleOutputs>)
                   -> Option<Arc<WorkflowHandle>> {
        let task = self.tasks.take(task_id)?;
        let branch = self.viztrail.get_branch(&task.branch_id)?;
        let guard = branch.lock();
        let head = guard.head()?;
        let index = head.position(&task.module_id)?;
        let module = &head.modules()[index];
        let applied = match to {
            ModuleState::Error => module.set_error(finished_at, outputs),
            _ => module.set_canceled(finished_at, outputs),
        };
        if let Err(e) = applied {
            debug!("{to} ignored for task {task_id}: {e}");
            return None;
        }
        self.cancel_pending(&head, index + 1);
        Some(head)
    }
}

impl WorkflowController for ProjectEngine {
    /// Consulta la tarea sin consumirla: el callback terminal que sigue la necesita.
    fn set_running(&self, task_id: &Uuid, started_at: Option<DateTime<Utc>>) -> Option<Arc<WorkflowHandle>> {
        let task = self.tasks.get(task_id)?;
        let branch = self.viztrail.get_branch(&task.branch_id)?;
        let guard = branch.lock();
        let head = guard.head()?;
        let index = head.position(&task.module_id)?;
        let module = &head.modules()[index];
        if !module.is_pending() {
            debug!("set_running ignored for task {task_id}: module is {}", module.state());
            return None;
        }
        match module.set_running(task.external_form, started_at) {
            Ok(ModuleState::Running) => {}
            Ok(_) => {
                self.tasks.take(task_id);
                self.cancel_pending(&head, index + 1);
            }
            Err(e) => {
                debug!("set_running ignored for task {task_id}: {e}");
                return None;
            }
        }
        Some(head)
    }

    fn set_success(&self, task_id: &Uuid, result: TaskResult) -> Option<Arc<WorkflowHandle>> {
        let task = self.tasks.take(task_id)?;
        let branch = self.viztrail.get_branch(&task.branch_id)?;
        let guard = branch.lock();
        let head = guard.head()?;
        let index = head.position(&task.module_id)?;
        let module = &head.modules()[index];
        let TaskResult { finished_at,
                         datasets,
                         outputs,
                         provenance } = result;
        let dispatch = match module.set_success(finished_at, datasets, outputs, provenance) {
            Ok(ModuleState::Success) => self.advance(&head, index + 1, module.datasets(), task.branch_id),
            Ok(_) => {
                self.cancel_pending(&head, index + 1);
                None
            }
            Err(e) => {
                debug!("set_success ignored for task {task_id}: {e}");
                return None;
            }
        };
        drop(guard);
        self.dispatch(dispatch);
        Some(head)
    }

    fn set_error(&self,
                 task_id: &Uuid,
                 finished_at: Option<DateTime<Utc>>,
                 outputs: Option<ModuleOutputs>)
                 -> Option<Arc<WorkflowHandle>> {
        self.finish_task(task_id, ModuleState::Error, finished_at, outputs)
    }

    fn set_canceled(&self,
                    task_id: &Uuid,
                    finished_at: Option<DateTime<Utc>>,
                    outputs: Option<ModuleOutputs>)
                    -> Option<Arc<WorkflowHandle>> {
        self.finish_task(task_id, ModuleState::Canceled, finished_at, outputs)
    }
}
