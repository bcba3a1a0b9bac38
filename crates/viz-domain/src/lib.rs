// viz-domain library entry point
pub mod command;
pub mod dataset;
pub mod datastore;
pub mod error;
pub mod package;
pub use command::{ModuleArgument, ModuleCommand};
pub use dataset::{DatasetColumn, DatasetContext, DatasetDescriptor};
pub use datastore::{Datastore, InMemoryDatastore};
pub use error::DomainError;
pub use package::{CommandDeclaration, FormatElement, PackageDeclaration, PackageRegistry, ParameterDatatype,
                  ParameterDeclaration};
