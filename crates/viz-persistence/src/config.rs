//! Configuración del store desde variables de entorno.
//! `VIZFLOW_DATA_DIR` y `VIZFLOW_STORE_RETRIES`, ambas opcionales.

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_DATA_DIR: &str = ".vizflow";
pub const DEFAULT_STORE_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from(DEFAULT_DATA_DIR),
               retries: DEFAULT_STORE_RETRIES }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let data_dir = env::var("VIZFLOW_DATA_DIR").map(PathBuf::from)
                                                   .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
        let retries = env::var("VIZFLOW_STORE_RETRIES").ok()
                                                       .and_then(|v| v.parse().ok())
                                                       .unwrap_or(DEFAULT_STORE_RETRIES);
        Self { data_dir, retries }
    }
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() { Lazy::force(&DOTENV_LOADED); }
