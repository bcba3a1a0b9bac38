//! Comandos de módulo: paquete + comando + lista de argumentos.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleArgument {
    pub id: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCommand {
    pub package_id: String,
    pub command_id: String,
    #[serde(default)]
    pub arguments: Vec<ModuleArgument>,
}

impl ModuleCommand {
    pub fn new(package_id: impl Into<String>, command_id: impl Into<String>) -> Self {
        Self { package_id: package_id.into(),
               command_id: command_id.into(),
               arguments: Vec::new() }
    }

    /// Añade (o reemplaza) un argumento; estilo builder.
    pub fn with_argument(mut self, id: impl Into<String>, value: impl Into<Value>) -> Self {
        let id = id.into();
        let value = value.into();
        match self.arguments.iter_mut().find(|a| a.id == id) {
            Some(arg) => arg.value = value,
            None => self.arguments.push(ModuleArgument { id, value }),
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.arguments.iter().find(|a| a.id == id).map(|a| &a.value)
    }

    pub fn get_str(&self, id: &str) -> Option<&str> { self.get(id).and_then(Value::as_str) }

    pub fn get_u64(&self, id: &str) -> Option<u64> { self.get(id).and_then(Value::as_u64) }

    /// `"<package>.<command>"`, usado también como forma externa de respaldo.
    pub fn qualified_name(&self) -> String { format!("{}.{}", self.package_id, self.command_id) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn with_argument_replaces_existing_value() {
        let cmd = ModuleCommand::new("data", "create").with_argument("name", "people")
                                                      .with_argument("rows", 3)
                                                      .with_argument("name", "persons");
        assert_eq!(cmd.arguments.len(), 2);
        assert_eq!(cmd.get_str("name"), Some("persons"));
        assert_eq!(cmd.get_u64("rows"), Some(3));
        assert_eq!(cmd.get("columns"), None);
        assert_eq!(cmd.qualified_name(), "data.create");
    }

    #[test]
    fn serde_uses_camel_case() {
        let cmd = ModuleCommand::new("data", "fail");
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v, json!({"packageId": "data", "commandId": "fail", "arguments": []}));
    }
}
