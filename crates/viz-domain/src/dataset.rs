//! Descriptores de datasets.
//!
//! Un `DatasetDescriptor` es una referencia inmutable a una versión concreta
//! de un dataset tabular. El core sólo compara identificadores; columnas y
//! número de filas existen para mostrar y para los procesadores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Contexto de datasets: nombre de dataset -> descriptor vigente.
///
/// Se trata como valor inmutable entre módulos: cada módulo recibe su propia
/// copia.
pub type DatasetContext = BTreeMap<String, DatasetDescriptor>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetColumn {
    pub identifier: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl DatasetColumn {
    pub fn new(identifier: i64, name: impl Into<String>) -> Self {
        Self { identifier,
               name: name.into(),
               data_type: None }
    }

    pub fn with_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDescriptor {
    identifier: String,
    #[serde(default)]
    columns: Vec<DatasetColumn>,
    #[serde(default)]
    row_count: u64,
}

impl DatasetDescriptor {
    pub fn new(identifier: impl Into<String>, columns: Vec<DatasetColumn>, row_count: u64) -> Self {
        Self { identifier: identifier.into(),
               columns,
               row_count }
    }

    pub fn identifier(&self) -> &str { &self.identifier }
    pub fn columns(&self) -> &[DatasetColumn] { &self.columns }
    pub fn row_count(&self) -> u64 { self.row_count }

    /// Busca una columna por nombre (sin distinguir mayúsculas).
    pub fn column_by_name(&self, name: &str) -> Option<&DatasetColumn> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_by_id(&self, identifier: i64) -> Option<&DatasetColumn> {
        self.columns.iter().find(|c| c.identifier == identifier)
    }

    /// Dos descriptores representan la misma versión si comparten identificador.
    pub fn same_version(&self, other: &DatasetDescriptor) -> bool { self.identifier == other.identifier }
}

impl fmt::Display for DatasetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<dataset: {}, {} columns, {} rows>", self.identifier, self.columns.len(), self.row_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_lookup_ignores_case() {
        let ds = DatasetDescriptor::new("ds1",
                                        vec![DatasetColumn::new(0, "Name"), DatasetColumn::new(1, "Age").with_type("int")],
                                        10);
        assert_eq!(ds.column_by_name("name").map(|c| c.identifier), Some(0));
        assert_eq!(ds.column_by_id(1).and_then(|c| c.data_type.clone()), Some("int".to_string()));
        assert!(ds.column_by_name("missing").is_none());
    }

    #[test]
    fn version_identity_is_identifier_only() {
        let a = DatasetDescriptor::new("x", vec![], 1);
        let b = DatasetDescriptor::new("x", vec![DatasetColumn::new(0, "A")], 5);
        let c = DatasetDescriptor::new("y", vec![], 1);
        assert!(a.same_version(&b));
        assert!(!a.same_version(&c));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let ds = DatasetDescriptor::new("x", vec![], 3);
        let v = serde_json::to_value(&ds).unwrap();
        assert_eq!(v["rowCount"], 3);
        assert_eq!(v["identifier"], "x");
    }
}
