#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use viz_core::{Backend, CoreEngineError, InMemoryModuleStore, ModuleOutputs, ModuleProvenance, ModuleRecord,
               ModuleState, ModuleStore, OutputObject, ProjectEngine, TaskHandle, TaskResult, ViztrailHandle,
               WorkflowController, WorkflowHandle};
use viz_domain::{DatasetColumn, DatasetContext, Datastore, InMemoryDatastore, ModuleCommand};

pub const PKG: &str = "test";

pub fn create(name: &str) -> ModuleCommand { ModuleCommand::new(PKG, "create").with_argument("name", name) }
pub fn touch(name: &str) -> ModuleCommand { ModuleCommand::new(PKG, "touch").with_argument("name", name) }
pub fn derive(input: &str, output: &str) -> ModuleCommand {
    ModuleCommand::new(PKG, "derive").with_argument("input", input).with_argument("output", output)
}
pub fn opaque(name: &str) -> ModuleCommand { ModuleCommand::new(PKG, "opaque").with_argument("name", name) }
pub fn fail(message: &str) -> ModuleCommand { ModuleCommand::new(PKG, "fail").with_argument("message", message) }

fn label(command: &ModuleCommand) -> String {
    let target = command.get_str("name").or(command.get_str("output")).unwrap_or_default();
    format!("{}:{target}", command.command_id)
}

/// Ejecuta los comandos de prueba contra el datastore.
pub fn run_command(datastore: &dyn Datastore,
                   command: &ModuleCommand,
                   context: &DatasetContext)
                   -> Result<TaskResult, String> {
    let mut datasets = context.clone();
    let mut read = BTreeMap::new();
    let mut write = BTreeMap::new();
    let known = command.command_id != "opaque";
    match command.command_id.as_str() {
        "create" | "opaque" => {
            let name = command.get_str("name").ok_or("missing name")?;
            let ds = datastore.create_dataset(vec![DatasetColumn::new(0, name)], 1);
            write.insert(name.to_string(), ds.clone());
            datasets.insert(name.to_string(), ds);
        }
        "touch" => {
            let name = command.get_str("name").ok_or("missing name")?;
            let input = context.get(name).ok_or_else(|| format!("unknown dataset {name}"))?;
            read.insert(name.to_string(), input.identifier().to_string());
            let ds = datastore.create_dataset(input.columns().to_vec(), input.row_count() + 1);
            write.insert(name.to_string(), ds.clone());
            datasets.insert(name.to_string(), ds);
        }
        "derive" => {
            let input = command.get_str("input").ok_or("missing input")?;
            let output = command.get_str("output").ok_or("missing output")?;
            let source = context.get(input).ok_or_else(|| format!("unknown dataset {input}"))?;
            read.insert(input.to_string(), source.identifier().to_string());
            let ds = datastore.create_dataset(source.columns().to_vec(), source.row_count());
            write.insert(output.to_string(), ds.clone());
            datasets.insert(output.to_string(), ds);
        }
        "fail" => return Err(command.get_str("message").unwrap_or("failed").to_string()),
        other => return Err(format!("unknown command {other}")),
    }
    let provenance = if known { ModuleProvenance::new(read, write) } else { ModuleProvenance::default() };
    let outputs = ModuleOutputs::new(vec![OutputObject::text(format!("ok {}", label(command)))], vec![]);
    Ok(TaskResult::new(datasets, outputs, provenance))
}

#[derive(Clone)]
pub struct Executed {
    pub task: TaskHandle,
    pub command: ModuleCommand,
    pub context: DatasetContext,
    pub controller: Arc<dyn WorkflowController>,
}

/// Backend de prueba: en línea (RUNNING, completa dentro de `execute_task`)
/// o diferido (PENDING, la prueba decide cuándo completar).
pub struct ScriptedBackend {
    inline: bool,
    datastore: Arc<InMemoryDatastore>,
    executed: Mutex<Vec<Executed>>,
    pub canceled: Mutex<Vec<Uuid>>,
}

impl ScriptedBackend {
    pub fn inline(datastore: Arc<InMemoryDatastore>) -> Arc<Self> { Arc::new(Self::new(true, datastore)) }
    pub fn deferred(datastore: Arc<InMemoryDatastore>) -> Arc<Self> { Arc::new(Self::new(false, datastore)) }

    fn new(inline: bool, datastore: Arc<InMemoryDatastore>) -> Self {
        Self { inline,
               datastore,
               executed: Mutex::new(Vec::new()),
               canceled: Mutex::new(Vec::new()) }
    }

    pub fn executed(&self) -> Vec<Executed> { self.executed.lock().unwrap().clone() }
    pub fn count(&self) -> usize { self.executed.lock().unwrap().len() }
    pub fn labels(&self) -> Vec<String> { self.executed().iter().map(|e| label(&e.command)).collect() }
    pub fn last(&self) -> Executed { self.executed().last().cloned().expect("nothing executed") }

    fn finish(&self, exec: &Executed) -> Option<Arc<WorkflowHandle>> {
        match run_command(self.datastore.as_ref(), &exec.command, &exec.context) {
            Ok(result) => exec.controller.set_success(&exec.task.task_id, result),
            Err(message) => exec.controller
                                .set_error(&exec.task.task_id, None, Some(ModuleOutputs::error(message))),
        }
    }

    /// Completa (diferido) la ejecución `index`: RUNNING y luego el resultado.
    pub fn complete(&self, index: usize) -> Option<Arc<WorkflowHandle>> {
        let exec = self.executed()[index].clone();
        exec.controller.set_running(&exec.task.task_id, None);
        self.finish(&exec)
    }

    pub fn complete_last(&self) -> Option<Arc<WorkflowHandle>> { self.complete(self.count() - 1) }
}

impl Backend for ScriptedBackend {
    fn next_task_state(&self) -> ModuleState {
        if self.inline {
            ModuleState::Running
        } else {
            ModuleState::Pending
        }
    }

    fn execute_task(&self,
                    task: TaskHandle,
                    command: ModuleCommand,
                    context: DatasetContext,
                    controller: Arc<dyn WorkflowController>) {
        let exec = Executed { task,
                              command,
                              context,
                              controller };
        self.executed.lock().unwrap().push(exec.clone());
        if self.inline {
            self.finish(&exec);
        }
    }

    fn cancel_task(&self, task_id: &Uuid) { self.canceled.lock().unwrap().push(*task_id); }
}

/// Store que falla a demanda.
#[derive(Default)]
pub struct SwitchableStore {
    pub fail: AtomicBool,
    inner: InMemoryModuleStore,
}

impl SwitchableStore {
    pub fn set_failing(&self, fail: bool) { self.fail.store(fail, Ordering::SeqCst); }
}

impl ModuleStore for SwitchableStore {
    fn write(&self, module: &ModuleRecord) -> Result<(), CoreEngineError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreEngineError::Persistence("object store unavailable".into()));
        }
        self.inner.write(module)
    }
    fn read(&self, identifier: &Uuid) -> Option<ModuleRecord> { self.inner.read(identifier) }
}

pub struct Fixture {
    pub engine: Arc<ProjectEngine>,
    pub backend: Arc<ScriptedBackend>,
    pub datastore: Arc<InMemoryDatastore>,
    pub branch_id: Uuid,
}

pub fn fixture(inline: bool) -> Fixture { fixture_with_store(inline, Arc::new(InMemoryModuleStore::new())) }

pub fn fixture_with_store(inline: bool, store: Arc<dyn ModuleStore>) -> Fixture {
    let datastore = Arc::new(InMemoryDatastore::new());
    let backend = if inline {
        ScriptedBackend::inline(datastore.clone())
    } else {
        ScriptedBackend::deferred(datastore.clone())
    };
    let viztrail = Arc::new(ViztrailHandle::with_default_branch("test-env", BTreeMap::new(), "master"));
    let branch_id = viztrail.default_branch().expect("default branch").identifier();
    let engine = ProjectEngine::builder(viztrail, backend.clone()).datastore(datastore.clone())
                                                                  .module_store(store)
                                                                  .build();
    Fixture { engine,
              backend,
              datastore,
              branch_id }
}

impl Fixture {
    /// Añade y, si el backend es diferido, completa cada comando en orden.
    pub fn build(&self, commands: Vec<ModuleCommand>) -> Arc<WorkflowHandle> {
        let mut head = None;
        for command in commands {
            let wf = self.engine
                         .append_workflow_module(&self.branch_id, command)
                         .expect("append accepted")
                         .expect("branch exists");
            if !self.backend.inline {
                self.backend.complete_last();
            }
            head = Some(wf);
        }
        head.expect("at least one command")
    }

    pub fn head(&self) -> Arc<WorkflowHandle> {
        self.engine.get_branch(&self.branch_id).and_then(|b| b.head()).expect("head")
    }

    pub fn states(&self) -> Vec<ModuleState> { self.head().modules().iter().map(|m| m.state()).collect() }
}
