//! Registro de tareas despachadas.
//!
//! Inserción concurrente al despachar y extracción atómica de un solo uso
//! al recibir el callback: el primer callback terminal consume la entrada y
//! los siguientes no encuentran nada.

use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: Uuid,
    pub viztrail_id: Uuid,
    pub branch_id: Uuid,
    pub module_id: Uuid,
    pub external_form: String,
}

impl TaskHandle {
    pub fn new(viztrail_id: Uuid, branch_id: Uuid, module_id: Uuid, external_form: String) -> Self {
        Self { task_id: Uuid::new_v4(),
               viztrail_id,
               branch_id,
               module_id,
               external_form }
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: DashMap<Uuid, TaskHandle>,
}

impl TaskRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&self, task: TaskHandle) { self.tasks.insert(task.task_id, task); }

    /// Consulta sin consumir.
    pub fn get(&self, task_id: &Uuid) -> Option<TaskHandle> { self.tasks.get(task_id).map(|t| t.value().clone()) }

    /// Extrae la entrada; sólo una llamada concurrente obtiene `Some`.
    pub fn take(&self, task_id: &Uuid) -> Option<TaskHandle> { self.tasks.remove(task_id).map(|(_, t)| t) }

    /// Extrae todas las entradas de una rama.
    pub fn take_for_branch(&self, branch_id: &Uuid) -> Vec<TaskHandle> {
        let ids: Vec<Uuid> = self.tasks
                                 .iter()
                                 .filter(|t| t.value().branch_id == *branch_id)
                                 .map(|t| *t.key())
                                 .collect();
        ids.iter().filter_map(|id| self.take(id)).collect()
    }

    pub fn contains(&self, task_id: &Uuid) -> bool { self.tasks.contains_key(task_id) }
    pub fn len(&self) -> usize { self.tasks.len() }
    pub fn is_empty(&self) -> bool { self.tasks.is_empty() }
}
