//! Modelo de versiones: viztrail -> ramas -> snapshots de workflow.

mod branch;
mod handle;
mod workflow;

pub use branch::{BranchGuard, BranchHandle, BranchProvenance};
pub use handle::ViztrailHandle;
pub use workflow::{WorkflowAction, WorkflowDescriptor, WorkflowHandle};
pub(crate) use workflow::context_at;
