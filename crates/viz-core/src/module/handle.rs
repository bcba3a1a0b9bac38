//! `ModuleHandle`: registro compartido entre snapshots con transiciones persistidas.
//!
//! Cada transición construye el registro siguiente, lo escribe en el
//! `ModuleStore` y sólo entonces lo instala. Si la escritura falla el módulo
//! queda forzado a `Error` con un mensaje en stderr; ese camino nunca falla.
//! Un módulo terminal ya no admite transiciones, así que los snapshots
//! históricos que lo comparten no pueden observar cambios.

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use std::sync::{Arc, RwLock};
use uuid::Uuid;
use viz_domain::{DatasetContext, ModuleCommand};

use super::{ModuleRecord, ModuleState};
use crate::errors::CoreEngineError;
use crate::model::{ModuleOutputs, ModuleProvenance, ModuleTimestamp};
use crate::store::ModuleStore;
use crate::sync::{read, write};

pub struct ModuleHandle {
    identifier: Uuid,
    record: RwLock<ModuleRecord>,
    store: Arc<dyn ModuleStore>,
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let record = read(&self.record);
        f.debug_struct("ModuleHandle")
         .field("identifier", &self.identifier)
         .field("state", &record.state)
         .field("external_form", &record.external_form)
         .finish()
    }
}

impl ModuleHandle {
    /// Persiste `record` y devuelve el handle. Si la escritura falla el
    /// módulo nace en `Error`.
    pub fn create(record: ModuleRecord, store: Arc<dyn ModuleStore>) -> Arc<Self> {
        let identifier = record.identifier;
        let installed = match store.write(&record) {
            Ok(()) => record,
            Err(e) => forced_error(record, &e, store.as_ref()),
        };
        debug!("module created id={identifier} state={}", installed.state);
        Arc::new(Self { identifier,
                        record: RwLock::new(installed),
                        store })
    }

    pub fn identifier(&self) -> Uuid { self.identifier }
    pub fn state(&self) -> ModuleState { read(&self.record).state }
    pub fn is_active(&self) -> bool { self.state().is_active() }
    pub fn is_pending(&self) -> bool { self.state().is_pending() }
    pub fn is_running(&self) -> bool { self.state().is_running() }
    pub fn is_success(&self) -> bool { self.state() == ModuleState::Success }
    pub fn command(&self) -> ModuleCommand { read(&self.record).command.clone() }
    pub fn external_form(&self) -> String { read(&self.record).external_form.clone() }
    pub fn timestamp(&self) -> ModuleTimestamp { read(&self.record).timestamp }
    pub fn datasets(&self) -> DatasetContext { read(&self.record).datasets.clone() }
    pub fn outputs(&self) -> ModuleOutputs { read(&self.record).outputs.clone() }
    pub fn provenance(&self) -> ModuleProvenance { read(&self.record).provenance.clone() }

    /// Copia del registro completo.
    pub fn snapshot(&self) -> ModuleRecord { read(&self.record).clone() }

    /// `Pending` -> `Running`; limpia salidas y datasets.
    pub fn set_running(&self,
                       external_form: String,
                       started_at: Option<DateTime<Utc>>)
                       -> Result<ModuleState, CoreEngineError> {
        self.transition(None, ModuleState::Running, |r| {
                r.external_form = external_form;
                r.timestamp.start(started_at);
                r.outputs = ModuleOutputs::default();
                r.datasets = DatasetContext::new();
            })
    }

    /// `Running` -> `Success`; instala datasets, salidas y provenance (o vacíos).
    pub fn set_success(&self,
                       finished_at: Option<DateTime<Utc>>,
                       datasets: Option<DatasetContext>,
                       outputs: Option<ModuleOutputs>,
                       provenance: Option<ModuleProvenance>)
                       -> Result<ModuleState, CoreEngineError> {
        self.transition(Some(ModuleState::Running), ModuleState::Success, |r| {
                r.timestamp.finish(finished_at);
                r.datasets = datasets.unwrap_or_default();
                r.outputs = outputs.unwrap_or_default();
                r.provenance = provenance.unwrap_or_default();
            })
    }

    /// `Pending` -> `Success` sin ejecutar: conserva salidas y provenance e
    /// instala el contexto reconstruido a partir del write-set.
    pub fn skip(&self, datasets: DatasetContext) -> Result<ModuleState, CoreEngineError> {
        self.transition(Some(ModuleState::Pending), ModuleState::Success, |r| {
                r.timestamp.finish(None);
                r.datasets = datasets;
            })
    }

    /// Activo -> `Error`; limpia los datasets.
    pub fn set_error(&self,
                     finished_at: Option<DateTime<Utc>>,
                     outputs: Option<ModuleOutputs>)
                     -> Result<ModuleState, CoreEngineError> {
        self.terminate(ModuleState::Error, finished_at, outputs)
    }

    /// Activo -> `Canceled`; limpia los datasets.
    pub fn set_canceled(&self,
                        finished_at: Option<DateTime<Utc>>,
                        outputs: Option<ModuleOutputs>)
                        -> Result<ModuleState, CoreEngineError> {
        self.terminate(ModuleState::Canceled, finished_at, outputs)
    }

    fn terminate(&self,
                 to: ModuleState,
                 finished_at: Option<DateTime<Utc>>,
                 outputs: Option<ModuleOutputs>)
                 -> Result<ModuleState, CoreEngineError> {
        self.transition(None, to, |r| {
                r.timestamp.finish(finished_at);
                r.outputs = outputs.unwrap_or_default();
                r.datasets = DatasetContext::new();
            })
    }

    /// Devuelve el estado resultante: `to`, o `Error` si la persistencia falló.
    fn transition<F>(&self, source: Option<ModuleState>, to: ModuleState, apply: F) -> Result<ModuleState, CoreEngineError>
        where F: FnOnce(&mut ModuleRecord)
    {
        let mut record = write(&self.record);
        let from = record.state;
        if !from.can_transition_to(to) || source.is_some_and(|s| s != from) {
            return Err(CoreEngineError::InvalidTransition { from, to });
        }
        let mut next = record.clone();
        next.state = to;
        apply(&mut next);
        match self.store.write(&next) {
            Ok(()) => {
                debug!("module {} {from} -> {to}", self.identifier);
                *record = next;
                Ok(to)
            }
            Err(e) => {
                *record = forced_error(next, &e, self.store.as_ref());
                Ok(ModuleState::Error)
            }
        }
    }
}

/// Fuerza `Error` con un diagnóstico en stderr. Intenta persistirlo una vez;
/// un segundo fallo sólo se registra en el log.
fn forced_error(mut record: ModuleRecord, cause: &CoreEngineError, store: &dyn ModuleStore) -> ModuleRecord {
    error!("module {} persist failed ({}): {cause}; forcing ERROR",
           record.identifier,
           record.state);
    record.state = ModuleState::Error;
    record.timestamp.finish(None);
    record.datasets = DatasetContext::new();
    record.outputs = ModuleOutputs::error(cause.to_string());
    if let Err(e) = store.write(&record) {
        warn!("module {} forced ERROR not persisted: {e}", record.identifier);
    }
    record
}
