use thiserror::Error;
use viz_core::ModuleOutputs;
use viz_domain::DomainError;

/// Fallo de un procesador; termina el módulo en `Error`.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProcessorError {
    #[error("no processor for package '{0}'")]
    UnknownPackage(String),
    #[error("unknown command '{package_id}.{command_id}'")]
    UnknownCommand { package_id: String, command_id: String },
    #[error("missing argument '{0}'")]
    MissingArgument(String),
    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ProcessorError {
    /// Salidas del módulo fallido: el mensaje en stderr.
    pub fn to_outputs(&self) -> ModuleOutputs { ModuleOutputs::error(self.to_string()) }
}
