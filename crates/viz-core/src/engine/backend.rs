//! Contratos entre el orquestador y los backends de ejecución.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;
use viz_domain::{DatasetContext, ModuleCommand};

use super::TaskHandle;
use crate::model::{ModuleOutputs, ModuleProvenance};
use crate::module::ModuleState;
use crate::viztrail::WorkflowHandle;

/// Backend de ejecución (síncrono, asíncrono, pool de hilos o cola remota).
///
/// `execute_task` puede llamar al controlador en línea (antes de retornar) o
/// más tarde desde otro hilo. `cancel_task` se invoca con el ámbito de la
/// rama tomado: no debe bloquear ni llamar al controlador de forma síncrona.
pub trait Backend: Send + Sync {
    /// `Running` si el backend ejecuta en línea, `Pending` si difiere.
    fn next_task_state(&self) -> ModuleState;

    fn execute_task(&self,
                    task: TaskHandle,
                    command: ModuleCommand,
                    context: DatasetContext,
                    controller: Arc<dyn WorkflowController>);

    fn cancel_task(&self, task_id: &Uuid);
}

/// Resultado de una ejecución exitosa.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskResult {
    pub finished_at: Option<DateTime<Utc>>,
    pub datasets: Option<DatasetContext>,
    pub outputs: Option<ModuleOutputs>,
    pub provenance: Option<ModuleProvenance>,
}

impl TaskResult {
    pub fn new(datasets: DatasetContext, outputs: ModuleOutputs, provenance: ModuleProvenance) -> Self {
        Self { finished_at: Some(Utc::now()),
               datasets: Some(datasets),
               outputs: Some(outputs),
               provenance: Some(provenance) }
    }
}

/// Puntos de entrada de los callbacks. Devuelven la cabeza afectada, o
/// `None` si el callback no tuvo efecto (tarea desconocida o ya consumida,
/// módulo fuera del estado esperado).
pub trait WorkflowController: Send + Sync {
    fn set_running(&self, task_id: &Uuid, started_at: Option<DateTime<Utc>>) -> Option<Arc<WorkflowHandle>>;

    fn set_success(&self, task_id: &Uuid, result: TaskResult) -> Option<Arc<WorkflowHandle>>;

    fn set_error(&self,
                 task_id: &Uuid,
                 finished_at: Option<DateTime<Utc>>,
                 outputs: Option<ModuleOutputs>)
                 -> Option<Arc<WorkflowHandle>>;

    fn set_canceled(&self,
                    task_id: &Uuid,
                    finished_at: Option<DateTime<Utc>>,
                    outputs: Option<ModuleOutputs>)
                    -> Option<Arc<WorkflowHandle>>;
}
