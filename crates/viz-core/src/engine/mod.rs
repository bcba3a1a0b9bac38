//! Orquestador: ediciones estructurales, callbacks del backend y
//! encadenamiento hacia adelante.

pub mod backend;
pub mod builder;
pub mod project;
pub mod tasks;

pub use backend::{Backend, TaskResult, WorkflowController};
pub use builder::ProjectEngineBuilder;
pub use project::{BranchSource, ProjectEngine};
pub use tasks::{TaskHandle, TaskRegistry};
