//! Módulo: un paso del workflow y su máquina de estados.

mod handle;
mod record;
mod state;

pub use handle::ModuleHandle;
pub use record::ModuleRecord;
pub use state::ModuleState;
