//! `FsModuleStore`: un documento JSON por módulo.
//!
//! Layout: `<data_dir>/modules/<module-id>.json`. Cada escritura va a un
//! fichero temporal y se renombra sobre el destino, así un lector nunca ve un
//! documento a medias. Los errores transitorios de E/S se reintentan con
//! backoff corto.
//!
//! El store es síncrono: el backoff duerme el hilo que escribe, y con
//! `TokioBackend` ése es un worker del runtime (hasta 90ms con los 3
//! reintentos por defecto). `with_retries(0)` lo desactiva.

use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;
use viz_core::{CoreEngineError, ModuleRecord, ModuleStore};

use crate::config::{StoreConfig, DEFAULT_STORE_RETRIES};
use crate::error::PersistenceError;

const MODULES_DIR: &str = "modules";
const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FsModuleStore {
    dir: PathBuf,
    retries: u32,
}

impl FsModuleStore {
    /// Abre (creando si falta) el directorio de módulos bajo `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let dir = root.as_ref().join(MODULES_DIR);
        fs::create_dir_all(&dir)?;
        debug!("module store opened at {}", dir.display());
        Ok(Self { dir,
                  retries: DEFAULT_STORE_RETRIES })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, PersistenceError> {
        Ok(Self::open(&config.data_dir)?.with_retries(config.retries))
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn path_for(&self, identifier: &Uuid) -> PathBuf { self.dir.join(format!("{identifier}.{EXTENSION}")) }

    /// Reemplaza atómicamente el documento del módulo.
    pub fn save(&self, record: &ModuleRecord) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let target = self.path_for(&record.identifier);
        let tmp = target.with_extension(format!("{EXTENSION}.tmp"));
        with_retry(self.retries, || {
            fs::write(&tmp, &bytes)?;
            fs::rename(&tmp, &target)?;
            Ok(())
        })?;
        debug!("module {} saved state={}", record.identifier, record.state);
        Ok(())
    }

    pub fn load(&self, identifier: &Uuid) -> Result<ModuleRecord, PersistenceError> {
        let path = self.path_for(identifier);
        let bytes = with_retry(self.retries, || Ok(fs::read(&path)?))?;
        serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupted { path: path.display().to_string(),
                                                                                 reason: e.to_string() })
    }

    /// Todos los módulos guardados, ordenados por fecha de creación.
    /// Los documentos ilegibles se omiten con un aviso.
    pub fn list(&self) -> Result<Vec<ModuleRecord>, PersistenceError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(identifier) = path.file_stem()
                                       .and_then(|s| s.to_str())
                                       .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };
            match self.load(&identifier) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping {}: {e}", path.display()),
            }
        }
        records.sort_by_key(|r| r.timestamp.created_at);
        Ok(records)
    }

    /// `Ok(false)` si el documento no existía.
    pub fn remove(&self, identifier: &Uuid) -> Result<bool, PersistenceError> {
        match fs::remove_file(self.path_for(identifier)) {
            Ok(()) => Ok(true),
            Err(e) => match PersistenceError::from(e) {
                PersistenceError::NotFound => Ok(false),
                other => Err(other),
            },
        }
    }
}

impl ModuleStore for FsModuleStore {
    fn write(&self, module: &ModuleRecord) -> Result<(), CoreEngineError> { Ok(self.save(module)?) }

    fn read(&self, identifier: &Uuid) -> Option<ModuleRecord> {
        match self.load(identifier) {
            Ok(record) => Some(record),
            Err(PersistenceError::NotFound) => None,
            Err(e) => {
                warn!("module {identifier} unreadable: {e}");
                None
            }
        }
    }
}

/// Retry simple con backoff lineal (15ms, 30ms, ...) sobre errores transitorios.
/// Emite `warn!` por intento.
fn with_retry<F, T>(retries: u32, mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if e.is_retryable() && attempts < retries => {
                let delay_ms = 15 * u64::from(attempts + 1);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}
