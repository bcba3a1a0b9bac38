use serde::{Deserialize, Serialize};
use uuid::Uuid;
use viz_domain::{DatasetContext, ModuleCommand};

use super::ModuleState;
use crate::model::{ModuleOutputs, ModuleProvenance, ModuleTimestamp};

/// Registro completo de un módulo; es la unidad que se persiste.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub identifier: Uuid,
    pub command: ModuleCommand,
    pub external_form: String,
    pub state: ModuleState,
    pub timestamp: ModuleTimestamp,
    #[serde(default)]
    pub datasets: DatasetContext,
    #[serde(default)]
    pub outputs: ModuleOutputs,
    #[serde(rename = "prov", default)]
    pub provenance: ModuleProvenance,
}

impl ModuleRecord {
    /// Registro nuevo en `Pending` o `Running` (este último con `started_at`).
    pub fn new(command: ModuleCommand, external_form: String, state: ModuleState) -> Self {
        let mut timestamp = ModuleTimestamp::now();
        if state.is_running() {
            timestamp.start(None);
        }
        Self { identifier: Uuid::new_v4(),
               command,
               external_form,
               state,
               timestamp,
               datasets: DatasetContext::new(),
               outputs: ModuleOutputs::default(),
               provenance: ModuleProvenance::default() }
    }

    /// Copia pendiente (identificador y timestamps nuevos) que arrastra
    /// comando, salidas, datasets y provenance sin ejecutarse.
    pub fn carry_forward(&self) -> Self {
        Self { identifier: Uuid::new_v4(),
               state: ModuleState::Pending,
               timestamp: ModuleTimestamp::now(),
               ..self.clone() }
    }
}
