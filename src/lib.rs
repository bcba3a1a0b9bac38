//! VizFlow Rust Library
//!
//! Punto de entrada de la librería:
//! - Reexporta los crates del workspace (`domain`, `core`, `persistence`,
//!   `adapters`).
//! - Expone `Session`, que arma un `ProjectEngine` a partir de la
//!   configuración de entorno y ofrece ediciones que esperan a que la rama
//!   quede en reposo.
//! - Expone `errors` con el error de nivel aplicación.

pub mod errors;
pub mod session;

pub use viz_adapters as adapters;
pub use viz_core as core;
pub use viz_domain as domain;
pub use viz_persistence as persistence;

pub use errors::VizflowError;
pub use session::Session;
