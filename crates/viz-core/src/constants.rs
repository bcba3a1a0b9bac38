//! Constantes del core.

/// Clave de la propiedad con el nombre legible de ramas y viztrails.
pub const PROPERTY_NAME: &str = "name";

/// Nombre por defecto de la primera rama de un viztrail.
pub const DEFAULT_BRANCH_NAME: &str = "master";

/// Tipo MIME de las salidas de texto plano.
pub const MIME_TEXT: &str = "text/plain";
