//! Construcción de backends según `BackendKind` y espera de ramas en reposo.
//!
//! `async` y `queue` necesitan un runtime tokio activo; `queue` arranca en él
//! un worker que consume la cola.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use uuid::Uuid;
use viz_core::{Backend, ProjectEngine, WorkflowHandle};

use crate::backends::{QueueBackend, QueueWorker, SynchronousBackend, TokioBackend};
use crate::config::BackendKind;
use crate::processor::ProcessorRegistry;

pub const SETTLE_POLL: Duration = Duration::from_millis(5);

pub fn build_backend(kind: BackendKind, processors: ProcessorRegistry) -> Result<Arc<dyn Backend>, TryCurrentError> {
    if kind == BackendKind::Sync {
        return Ok(Arc::new(SynchronousBackend::new(processors)));
    }
    let runtime = Handle::try_current()?;
    if kind == BackendKind::Async {
        return Ok(Arc::new(TokioBackend::new(processors, runtime)));
    }
    let queue = Arc::new(QueueBackend::new());
    let worker = QueueWorker::new(processors);
    let consumer = queue.clone();
    runtime.spawn(async move {
               loop {
                   let task = consumer.next().await;
                   worker.process(task).await;
               }
           });
    Ok(queue)
}

/// Espera a que la cabeza de la rama deje de estar activa. `None` si la rama
/// no existe o no tiene historia.
pub async fn settle(engine: &ProjectEngine, branch_id: &Uuid) -> Option<Arc<WorkflowHandle>> {
    loop {
        match engine.get_branch(branch_id)?.head() {
            Some(head) if head.is_active() => tokio::time::sleep(SETTLE_POLL).await,
            head => return head,
        }
    }
}
