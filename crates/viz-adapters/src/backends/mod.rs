//! Implementaciones de `viz_core::Backend`.

use chrono::Utc;
use log::debug;
use uuid::Uuid;
use viz_core::{TaskResult, WorkflowController};

use crate::error::ProcessorError;

pub mod asynchronous;
pub mod queue;
pub mod sync;

pub use asynchronous::TokioBackend;
pub use queue::{QueueBackend, QueueWorker, QueuedTask};
pub use sync::SynchronousBackend;

/// Notifica al controlador el desenlace de una tarea.
pub(crate) fn report(controller: &dyn WorkflowController, task_id: &Uuid, result: Result<TaskResult, ProcessorError>) {
    let head = match result {
        Ok(result) => controller.set_success(task_id, result),
        Err(e) => {
            debug!("task {task_id} failed: {e}");
            controller.set_error(task_id, Some(Utc::now()), Some(e.to_outputs()))
        }
    };
    if head.is_none() {
        debug!("task {task_id}: result discarded by the engine");
    }
}
