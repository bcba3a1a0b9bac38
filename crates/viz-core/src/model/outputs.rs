use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::MIME_TEXT;

/// Una salida capturada (texto o contenido estructurado con su tipo MIME).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputObject {
    #[serde(rename = "type")]
    pub mime_type: String,
    pub value: Value,
}

impl OutputObject {
    pub fn text(value: impl Into<String>) -> Self {
        Self { mime_type: MIME_TEXT.to_string(),
               value: Value::String(value.into()) }
    }

    pub fn is_text(&self) -> bool { self.mime_type == MIME_TEXT }
}

/// Salidas estándar y de error, en orden de emisión.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleOutputs {
    #[serde(default)]
    pub stdout: Vec<OutputObject>,
    #[serde(default)]
    pub stderr: Vec<OutputObject>,
}

impl ModuleOutputs {
    pub fn new(stdout: Vec<OutputObject>, stderr: Vec<OutputObject>) -> Self { Self { stdout, stderr } }

    /// Salida con un único mensaje de error.
    pub fn error(message: impl Into<String>) -> Self {
        Self { stdout: Vec::new(),
               stderr: vec![OutputObject::text(message)] }
    }

    pub fn push_stdout(&mut self, output: OutputObject) { self.stdout.push(output); }
    pub fn push_stderr(&mut self, output: OutputObject) { self.stderr.push(output); }
    pub fn is_empty(&self) -> bool { self.stdout.is_empty() && self.stderr.is_empty() }
}
