//! Backend de cola: `execute_task` sólo encola. Workers externos (aquí
//! `QueueWorker`) reclaman tareas, notifican RUNNING, calculan y reportan.
//! Los módulos nacen en PENDING.

use chrono::Utc;
use log::{debug, info};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use uuid::Uuid;
use viz_core::{Backend, ModuleState, TaskHandle, TaskResult, WorkflowController};
use viz_domain::{DatasetContext, ModuleCommand};

use super::report;
use crate::error::ProcessorError;
use crate::processor::ProcessorRegistry;

/// Tarea en espera de un worker.
pub struct QueuedTask {
    pub task: TaskHandle,
    pub command: ModuleCommand,
    pub context: DatasetContext,
    controller: Arc<dyn WorkflowController>,
    started: AtomicBool,
}

impl QueuedTask {
    /// `false` si el motor ya no espera esta tarea.
    pub fn start(&self) -> bool {
        self.started.store(true, Ordering::SeqCst);
        self.controller.set_running(&self.task.task_id, Some(Utc::now())).is_some()
    }

    /// Reporta el resultado. Sin `start` previo notifica antes RUNNING; si el
    /// motor ya no espera la tarea el resultado se descarta.
    pub fn finish(self, result: Result<TaskResult, ProcessorError>) {
        if !self.started.load(Ordering::SeqCst) && !self.start() {
            debug!("result of task {} discarded: no longer wanted", self.task.task_id);
            return;
        }
        report(self.controller.as_ref(), &self.task.task_id, result);
    }
}

#[derive(Default)]
pub struct QueueBackend {
    queue: Mutex<VecDeque<QueuedTask>>,
    notify: Notify,
}

impl QueueBackend {
    pub fn new() -> Self { Self::default() }

    fn queue(&self) -> MutexGuard<'_, VecDeque<QueuedTask>> { self.queue.lock().unwrap_or_else(PoisonError::into_inner) }

    pub fn len(&self) -> usize { self.queue().len() }
    pub fn is_empty(&self) -> bool { self.queue().is_empty() }

    /// Identificadores en cola, en orden de llegada.
    pub fn queued(&self) -> Vec<Uuid> { self.queue().iter().map(|t| t.task.task_id).collect() }

    /// Reclama la tarea más antigua sin esperar.
    pub fn claim(&self) -> Option<QueuedTask> { self.queue().pop_front() }

    /// Espera hasta que haya una tarea que reclamar.
    pub async fn next(&self) -> QueuedTask {
        loop {
            let notified = self.notify.notified();
            if let Some(task) = self.claim() {
                return task;
            }
            notified.await;
        }
    }
}

impl Backend for QueueBackend {
    fn next_task_state(&self) -> ModuleState { ModuleState::Pending }

    fn execute_task(&self,
                    task: TaskHandle,
                    command: ModuleCommand,
                    context: DatasetContext,
                    controller: Arc<dyn WorkflowController>) {
        debug!("enqueue task {} [{}]", task.task_id, task.external_form);
        self.queue().push_back(QueuedTask { task,
                                            command,
                                            context,
                                            controller,
                                            started: AtomicBool::new(false) });
        self.notify.notify_one();
    }

    /// Retira la tarea si sigue en cola; una ya reclamada termina y su
    /// resultado se descarta en el motor.
    fn cancel_task(&self, task_id: &Uuid) {
        let mut queue = self.queue();
        let before = queue.len();
        queue.retain(|t| t.task.task_id != *task_id);
        if queue.len() < before {
            info!("task {task_id} removed from queue");
        }
    }
}

/// Worker que consume un `QueueBackend` con un registro de procesadores.
#[derive(Clone)]
pub struct QueueWorker {
    processors: ProcessorRegistry,
}

impl QueueWorker {
    pub fn new(processors: ProcessorRegistry) -> Self { Self { processors } }

    /// Ejecuta una tarea ya reclamada.
    pub async fn process(&self, task: QueuedTask) {
        if !task.start() {
            debug!("task {} dropped: no longer wanted", task.task.task_id);
            return;
        }
        let result = self.processors.run(&task.command, &task.context).await;
        task.finish(result);
    }

    /// Procesa una tarea si hay alguna en cola.
    pub async fn run_once(&self, queue: &QueueBackend) -> bool {
        match queue.claim() {
            Some(task) => {
                self.process(task).await;
                true
            }
            None => false,
        }
    }

    /// Procesa hasta vaciar la cola (incluidas las tareas que se encolan al
    /// completar otras). Devuelve cuántas procesó.
    pub async fn drain(&self, queue: &QueueBackend) -> usize {
        let mut processed = 0;
        while self.run_once(queue).await {
            processed += 1;
        }
        processed
    }
}
