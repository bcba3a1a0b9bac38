//! Backend síncrono: los módulos nacen en RUNNING y se ejecutan dentro de
//! `execute_task`; los callbacks llegan antes de que vuelva la llamada.

use futures::executor::block_on;
use std::sync::Arc;
use uuid::Uuid;
use viz_core::{Backend, ModuleState, TaskHandle, WorkflowController};
use viz_domain::{DatasetContext, ModuleCommand};

use super::report;
use crate::processor::ProcessorRegistry;

pub struct SynchronousBackend {
    processors: ProcessorRegistry,
}

impl SynchronousBackend {
    pub fn new(processors: ProcessorRegistry) -> Self { Self { processors } }
}

impl Backend for SynchronousBackend {
    fn next_task_state(&self) -> ModuleState { ModuleState::Running }

    fn execute_task(&self,
                    task: TaskHandle,
                    command: ModuleCommand,
                    context: DatasetContext,
                    controller: Arc<dyn WorkflowController>) {
        let result = block_on(self.processors.run(&command, &context));
        report(controller.as_ref(), &task.task_id, result);
    }

    /// Nada que cancelar: la tarea ya terminó cuando `execute_task` vuelve.
    fn cancel_task(&self, _task_id: &Uuid) {}
}
