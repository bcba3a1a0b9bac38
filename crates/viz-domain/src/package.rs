//! Declaraciones de paquetes y comandos.
//!
//! Un paquete agrupa comandos; cada comando declara sus parámetros y un
//! formato para producir la forma externa (texto legible) de un módulo. La
//! forma externa es sólo para mostrar: los fallos de renderizado nunca deben
//! bloquear la planificación, por eso `PackageRegistry::to_external_form`
//! degrada a `"<package>.<command>"`.

use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::command::ModuleCommand;
use crate::dataset::DatasetContext;
use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterDatatype {
    Bool,
    #[serde(rename = "colid")]
    ColumnId,
    #[serde(rename = "dataset")]
    DatasetId,
    Decimal,
    Int,
    List,
    Record,
    #[serde(rename = "rowidx")]
    RowIndex,
    Code,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    pub id: String,
    pub name: String,
    pub datatype: ParameterDatatype,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl ParameterDeclaration {
    pub fn new(id: impl Into<String>, datatype: ParameterDatatype, required: bool) -> Self {
        let id = id.into();
        Self { name: id.clone(),
               id,
               datatype,
               required,
               parent: None }
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// Elemento de formato de la forma externa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FormatElement {
    /// Texto literal.
    Constant { value: String },
    /// Valor de un parámetro obligatorio.
    Variable { parameter: String },
    /// Valor de un parámetro opcional con prefijo/sufijo; vacío si falta.
    Optional {
        parameter: String,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        suffix: String,
    },
    /// Lista de registros; cada elemento se formatea con `format`.
    Group { parameter: String, format: Vec<FormatElement> },
}

impl FormatElement {
    pub fn constant(value: impl Into<String>) -> Self { Self::Constant { value: value.into() } }
    pub fn variable(parameter: impl Into<String>) -> Self { Self::Variable { parameter: parameter.into() } }
    pub fn optional(parameter: impl Into<String>, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self::Optional { parameter: parameter.into(),
                         prefix: prefix.into(),
                         suffix: suffix.into() }
    }
    pub fn group(parameter: impl Into<String>, format: Vec<FormatElement>) -> Self {
        Self::Group { parameter: parameter.into(),
                      format }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDeclaration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDeclaration>,
    #[serde(default)]
    pub format: Vec<FormatElement>,
}

impl CommandDeclaration {
    pub fn new(id: impl Into<String>, parameters: Vec<ParameterDeclaration>, format: Vec<FormatElement>) -> Self {
        let id = id.into();
        Self { name: id.clone(),
               id,
               parameters,
               format }
    }

    pub fn parameter(&self, id: &str) -> Option<&ParameterDeclaration> { self.parameters.iter().find(|p| p.id == id) }

    /// Parámetros obligatorios de primer nivel (o hijos de `parent`).
    pub fn mandatory(&self, parent: Option<&str>) -> Vec<&ParameterDeclaration> {
        self.parameters
            .iter()
            .filter(|p| p.required && p.parent.as_deref() == parent)
            .collect()
    }

    /// Renderiza la forma externa de `command` contra el contexto de datasets.
    pub fn to_external_form(&self, command: &ModuleCommand, context: &DatasetContext) -> Result<String, DomainError> {
        if self.format.is_empty() {
            return Ok(command.qualified_name());
        }
        let renderer = Renderer { declaration: self,
                                  command,
                                  context };
        let top: HashMap<&str, &Value> = command.arguments.iter().map(|a| (a.id.as_str(), &a.value)).collect();
        renderer.render(&self.format, &top)
    }
}

struct Renderer<'a> {
    declaration: &'a CommandDeclaration,
    command: &'a ModuleCommand,
    context: &'a DatasetContext,
}

impl Renderer<'_> {
    fn render(&self, format: &[FormatElement], values: &HashMap<&str, &Value>) -> Result<String, DomainError> {
        let mut tokens: Vec<String> = Vec::with_capacity(format.len());
        for element in format {
            let token = match element {
                FormatElement::Constant { value } => value.clone(),
                FormatElement::Variable { parameter } => match values.get(parameter.as_str()) {
                    Some(v) if !v.is_null() => self.format_value(parameter, v),
                    _ => return Err(DomainError::MissingArgument(parameter.clone())),
                },
                FormatElement::Optional { parameter, prefix, suffix } => match values.get(parameter.as_str()) {
                    Some(v) if !v.is_null() => format!("{prefix}{}{suffix}", self.format_value(parameter, v)),
                    _ => String::new(),
                },
                FormatElement::Group { parameter, format } => {
                    let Some(Value::Array(items)) = values.get(parameter.as_str()).copied() else {
                        return Err(DomainError::MissingArgument(parameter.clone()));
                    };
                    let mut rendered = Vec::with_capacity(items.len());
                    for item in items {
                        let nested: HashMap<&str, &Value> = match item {
                            Value::Object(map) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
                            _ => {
                                return Err(DomainError::ValidationError(format!("group '{parameter}' expects records")))
                            }
                        };
                        rendered.push(self.render(format, &nested)?);
                    }
                    rendered.join(", ")
                }
            };
            if !token.is_empty() {
                tokens.push(token);
            }
        }
        Ok(tokens.join(" "))
    }

    fn format_value(&self, parameter: &str, value: &Value) -> String {
        let datatype = self.declaration.parameter(parameter).map(|p| p.datatype);
        match (datatype, value) {
            // Las columnas se muestran por nombre cuando el dataset del comando está en el contexto.
            (Some(ParameterDatatype::ColumnId), Value::Number(n)) => n.as_i64()
                                                                      .and_then(|id| self.column_name(id))
                                                                      .unwrap_or_else(|| n.to_string()),
            (Some(ParameterDatatype::DatasetId), Value::String(s)) => s.to_uppercase(),
            (_, Value::String(s)) => s.clone(),
            (_, Value::Array(items)) => items.iter().map(|v| self.format_value(parameter, v)).collect::<Vec<_>>().join(", "),
            (_, other) => other.to_string(),
        }
    }

    fn column_name(&self, column_id: i64) -> Option<String> {
        let dataset_param = self.declaration
                                .parameters
                                .iter()
                                .find(|p| p.datatype == ParameterDatatype::DatasetId)?;
        let name = self.command.get_str(&dataset_param.id)?;
        let dataset = self.context.get(name)?;
        dataset.column_by_id(column_id).map(|c| c.name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDeclaration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub commands: Vec<CommandDeclaration>,
}

impl PackageDeclaration {
    pub fn new(id: impl Into<String>, commands: Vec<CommandDeclaration>) -> Self {
        let id = id.into();
        Self { name: id.clone(),
               id,
               commands }
    }

    pub fn get(&self, command_id: &str) -> Option<&CommandDeclaration> { self.commands.iter().find(|c| c.id == command_id) }
}

/// Índice de paquetes por identificador.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: HashMap<String, PackageDeclaration>,
}

impl PackageRegistry {
    pub fn new() -> Self { Self::default() }

    /// Registro con el paquete `data` incorporado.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DATA_PACKAGE.clone());
        registry
    }

    pub fn register(&mut self, package: PackageDeclaration) { self.packages.insert(package.id.clone(), package); }

    pub fn package(&self, package_id: &str) -> Option<&PackageDeclaration> { self.packages.get(package_id) }

    pub fn resolve(&self, command: &ModuleCommand) -> Result<&CommandDeclaration, DomainError> {
        let package = self.package(&command.package_id)
                          .ok_or_else(|| DomainError::UnknownPackage(command.package_id.clone()))?;
        package.get(&command.command_id)
               .ok_or_else(|| DomainError::UnknownCommand { package_id: command.package_id.clone(),
                                                            command_id: command.command_id.clone() })
    }

    /// Forma externa del comando; cualquier fallo degrada a `"<package>.<command>"`.
    pub fn to_external_form(&self, command: &ModuleCommand, context: &DatasetContext) -> String {
        match self.resolve(command).and_then(|decl| decl.to_external_form(command, context)) {
            Ok(text) => text,
            Err(e) => {
                warn!("external form fallback for {}: {e}", command.qualified_name());
                command.qualified_name()
            }
        }
    }
}

pub const DATA_PACKAGE_ID: &str = "data";

/// Paquete `data`: comandos de referencia sobre datasets.
pub static DATA_PACKAGE: Lazy<PackageDeclaration> = Lazy::new(|| {
    use FormatElement as F;
    use ParameterDatatype as T;
    PackageDeclaration::new(DATA_PACKAGE_ID,
                            vec![CommandDeclaration::new("create",
                                                         vec![ParameterDeclaration::new("name", T::DatasetId, true),
                                                              ParameterDeclaration::new("columns", T::List, true),
                                                              ParameterDeclaration::new("rows", T::Int, false)],
                                                         vec![F::constant("CREATE DATASET"),
                                                              F::variable("name"),
                                                              F::constant("WITH COLUMNS"),
                                                              F::variable("columns"),
                                                              F::optional("rows", "(", " ROWS)")]),
                                 CommandDeclaration::new("derive",
                                                         vec![ParameterDeclaration::new("input", T::DatasetId, true),
                                                              ParameterDeclaration::new("output", T::String, true),
                                                              ParameterDeclaration::new("rows", T::Int, false)],
                                                         vec![F::constant("DERIVE"),
                                                              F::variable("output"),
                                                              F::constant("FROM"),
                                                              F::variable("input"),
                                                              F::optional("rows", "LIMIT ", "")]),
                                 CommandDeclaration::new("fail",
                                                         vec![ParameterDeclaration::new("message", T::String, false)],
                                                         vec![F::constant("FAIL"), F::optional("message", "'", "'")])])
});
