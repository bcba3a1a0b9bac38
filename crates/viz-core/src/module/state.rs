use serde::{Deserialize, Serialize};
use std::fmt;

/// Estado de un módulo.
///
/// Las transiciones válidas son:
/// - `Pending` -> `Running` | `Canceled` | `Error`
/// - `Pending` -> `Success` (sólo al omitirse por provenance)
/// - `Running` -> `Success` | `Error` | `Canceled`
///
/// `Success`, `Error` y `Canceled` son terminales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleState {
    Pending,
    Running,
    Canceled,
    Error,
    Success,
}

impl ModuleState {
    pub fn is_active(self) -> bool { matches!(self, Self::Pending | Self::Running) }
    pub fn is_pending(self) -> bool { self == Self::Pending }
    pub fn is_running(self) -> bool { self == Self::Running }
    pub fn is_terminal(self) -> bool { !self.is_active() }

    pub fn can_transition_to(self, to: ModuleState) -> bool {
        use ModuleState::*;
        matches!((self, to),
                 (Pending, Running) | (Pending, Canceled) | (Pending, Error) | (Pending, Success)
                 | (Running, Success) | (Running, Error) | (Running, Canceled))
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Canceled => "CANCELED",
            Self::Error => "ERROR",
            Self::Success => "SUCCESS",
        };
        f.write_str(s)
    }
}
