//! Backend asíncrono sobre tokio: cada tarea es un `spawn` que notifica
//! RUNNING, calcula y reporta el resultado. `cancel_task` aborta la tarea.

use chrono::Utc;
use dashmap::DashMap;
use log::{debug, warn};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use uuid::Uuid;
use viz_core::{Backend, ModuleState, TaskHandle, WorkflowController};
use viz_domain::{DatasetContext, ModuleCommand};

use super::report;
use crate::processor::ProcessorRegistry;

pub struct TokioBackend {
    processors: ProcessorRegistry,
    runtime: Handle,
    running: Arc<DashMap<Uuid, AbortHandle>>,
}

impl TokioBackend {
    pub fn new(processors: ProcessorRegistry, runtime: Handle) -> Self {
        Self { processors,
               runtime,
               running: Arc::new(DashMap::new()) }
    }

    /// Usa el runtime desde el que se llama; `None` fuera de un runtime.
    pub fn from_current(processors: ProcessorRegistry) -> Option<Self> {
        Handle::try_current().ok().map(|h| Self::new(processors, h))
    }

    /// Tareas lanzadas que aún no terminaron.
    pub fn in_flight(&self) -> usize { self.running.len() }
}

impl Backend for TokioBackend {
    fn next_task_state(&self) -> ModuleState { ModuleState::Pending }

    fn execute_task(&self,
                    task: TaskHandle,
                    command: ModuleCommand,
                    context: DatasetContext,
                    controller: Arc<dyn WorkflowController>) {
        let task_id = task.task_id;
        let processors = self.processors.clone();
        let running = self.running.clone();
        // la tarea espera a quedar registrada para que `cancel_task` la encuentre
        let (registered_tx, registered_rx) = oneshot::channel::<()>();
        let join = self.runtime.spawn(async move {
                                   let _ = registered_rx.await;
                                   if controller.set_running(&task_id, Some(Utc::now())).is_none() {
                                       debug!("task {task_id} no longer wanted");
                                       running.remove(&task_id);
                                       return;
                                   }
                                   let result = processors.run(&command, &context).await;
                                   running.remove(&task_id);
                                   report(controller.as_ref(), &task_id, result);
                               });
        self.running.insert(task_id, join.abort_handle());
        let _ = registered_tx.send(());
    }

    fn cancel_task(&self, task_id: &Uuid) {
        match self.running.remove(task_id) {
            Some((_, handle)) => {
                debug!("abort task {task_id}");
                handle.abort();
            }
            None => warn!("cancel_task: task {task_id} not running"),
        }
    }
}
