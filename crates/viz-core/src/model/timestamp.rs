use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marcas temporales del ciclo de vida: `created_at <= started_at <= finished_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTimestamp {
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ModuleTimestamp {
    pub fn now() -> Self { Self::created(Utc::now()) }

    pub fn created(created_at: DateTime<Utc>) -> Self {
        Self { created_at,
               started_at: None,
               finished_at: None }
    }

    /// Registra el inicio sin retroceder antes de la creación.
    pub fn start(&mut self, started_at: Option<DateTime<Utc>>) {
        self.started_at = Some(started_at.unwrap_or_else(Utc::now).max(self.created_at));
    }

    /// Registra el fin; rellena `started_at` si nunca se notificó el inicio.
    pub fn finish(&mut self, finished_at: Option<DateTime<Utc>>) {
        let started = *self.started_at.get_or_insert(self.created_at);
        self.finished_at = Some(finished_at.unwrap_or_else(Utc::now).max(started));
    }
}
