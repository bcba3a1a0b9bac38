use thiserror::Error;
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum DomainError {
    #[error("{0}")]
    ValidationError(String),
    #[error("unknown package '{0}'")]
    UnknownPackage(String),
    #[error("unknown command '{package_id}.{command_id}'")]
    UnknownCommand { package_id: String, command_id: String },
    #[error("missing argument '{0}'")]
    MissingArgument(String),
    #[error("{0}")]
    ExternalError(String),
}
