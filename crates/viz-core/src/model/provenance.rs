//! Provenance de un módulo y la decisión "re-ejecutar u omitir".
//!
//! Un `read`/`write` sin definir (`None`) no equivale a un mapa vacío:
//! significa historia desconocida y siempre obliga a re-ejecutar.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use viz_domain::{DatasetContext, DatasetDescriptor, Datastore};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleProvenance {
    /// Nombre de dataset -> identificador leído.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<BTreeMap<String, String>>,
    /// Nombre de dataset -> descriptor escrito.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<BTreeMap<String, DatasetDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<BTreeMap<String, Value>>,
}

impl ModuleProvenance {
    pub fn new(read: BTreeMap<String, String>, write: BTreeMap<String, DatasetDescriptor>) -> Self {
        Self { read: Some(read),
               write: Some(write),
               resources: None }
    }

    pub fn with_resources(mut self, resources: BTreeMap<String, Value>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// `true` si se conocen tanto lecturas como escrituras.
    pub fn is_known(&self) -> bool { self.read.is_some() && self.write.is_some() }

    /// Indica si el módulo debe re-ejecutarse dado el contexto de entrada.
    ///
    /// Sólo devuelve `false` cuando cada dataset leído resuelve en `context` al
    /// mismo identificador registrado y existe un write-set con el que
    /// reconstruir el estado de salida.
    pub fn requires_exec(&self, context: &DatasetContext) -> bool {
        let (Some(read), Some(_)) = (&self.read, &self.write) else {
            return true;
        };
        read.iter().any(|(name, identifier)| {
                       let current = context.get(name).map(DatasetDescriptor::identifier);
                       let changed = current != Some(identifier.as_str());
                       if changed {
                           debug!("requires_exec: dataset '{name}' changed ({identifier} -> {current:?})");
                       }
                       changed
                   })
    }

    /// Contexto resultante de omitir el módulo: `context` más el write-set.
    ///
    /// Cada descriptor escrito se vuelve a resolver en el datastore para que el
    /// identificador siga siendo válido; si el datastore no lo conoce se
    /// conserva el descriptor registrado.
    pub fn adjust_state(&self, context: &DatasetContext, datastore: &dyn Datastore) -> DatasetContext {
        let mut next = context.clone();
        for (name, recorded) in self.write.iter().flatten() {
            let descriptor = match datastore.get_dataset(recorded.identifier()) {
                Some(current) => current,
                None => {
                    warn!("adjust_state: dataset {} ('{name}') unknown to datastore; keeping recorded descriptor",
                          recorded.identifier());
                    recorded.clone()
                }
            };
            next.insert(name.clone(), descriptor);
        }
        next
    }
}
