//! viz-persistence
//!
//! Implementaciones durables del contrato `ModuleStore` del core.
//!
//! Módulos:
//! - `fs`: un documento JSON por módulo bajo `<data_dir>/modules/`.
//! - `config`: carga de configuración desde .env.
//! - `error`: errores de E/S y serialización mapeados a variantes semánticas.

pub mod config;
pub mod error;
pub mod fs;

pub use config::{init_dotenv, StoreConfig};
pub use error::PersistenceError;
pub use fs::FsModuleStore;
