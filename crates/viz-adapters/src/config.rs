//! Configuración del motor desde variables de entorno.
//! `VIZFLOW_BACKEND` (sync | async | queue) y `VIZFLOW_DEFAULT_BRANCH`.

use dotenvy::dotenv;
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

pub const DEFAULT_BRANCH_NAME: &str = "master";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Sync,
    Async,
    Queue,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" | "synchronous" => Ok(Self::Sync),
            "async" | "tokio" => Ok(Self::Async),
            "queue" => Ok(Self::Queue),
            other => Err(format!("unknown backend '{other}'")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sync => "sync",
            Self::Async => "async",
            Self::Queue => "queue",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub backend: BackendKind,
    pub default_branch: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { backend: BackendKind::default(),
               default_branch: DEFAULT_BRANCH_NAME.to_string() }
    }
}

impl EngineConfig {
    /// Valores inválidos caen al valor por defecto con un aviso.
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let backend = match env::var("VIZFLOW_BACKEND") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                                  warn!("VIZFLOW_BACKEND: {e}; using sync");
                                  BackendKind::Sync
                              }),
            Err(_) => BackendKind::Sync,
        };
        let default_branch = env::var("VIZFLOW_DEFAULT_BRANCH").ok()
                                                               .filter(|v| !v.trim().is_empty())
                                                               .unwrap_or_else(|| DEFAULT_BRANCH_NAME.to_string());
        Self { backend,
               default_branch }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_aliases() {
        assert_eq!("SYNC".parse::<BackendKind>(), Ok(BackendKind::Sync));
        assert_eq!(" tokio ".parse::<BackendKind>(), Ok(BackendKind::Async));
        assert_eq!("queue".parse::<BackendKind>(), Ok(BackendKind::Queue));
        assert!("celery".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Async.to_string(), "async");
    }
}
