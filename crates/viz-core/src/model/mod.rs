//! Valores que componen el registro de un módulo.

mod outputs;
mod provenance;
mod timestamp;

pub use outputs::{ModuleOutputs, OutputObject};
pub use provenance::ModuleProvenance;
pub use timestamp::ModuleTimestamp;
