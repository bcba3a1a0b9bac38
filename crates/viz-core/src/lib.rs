//! viz-core: versionado de ramas/workflows y orquestador incremental.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod model;
pub mod module;
pub mod store;
pub mod viztrail;

mod sync;

pub use engine::{Backend, BranchSource, ProjectEngine, ProjectEngineBuilder, TaskHandle, TaskRegistry, TaskResult,
                 WorkflowController};
pub use errors::CoreEngineError;
pub use model::{ModuleOutputs, ModuleProvenance, ModuleTimestamp, OutputObject};
pub use module::{ModuleHandle, ModuleRecord, ModuleState};
pub use store::{InMemoryModuleStore, ModuleStore};
pub use viztrail::{BranchHandle, BranchProvenance, ViztrailHandle, WorkflowAction, WorkflowDescriptor,
                   WorkflowHandle};
