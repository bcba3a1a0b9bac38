//! Contrato del datastore y una implementación en memoria.

use dashmap::DashMap;
use uuid::Uuid;

use crate::dataset::{DatasetColumn, DatasetDescriptor};

/// Acceso estrecho al almacén de datasets.
///
/// El core sólo necesita resolver descriptores; los procesadores además
/// crean datasets nuevos. Las implementaciones garantizan su propia
/// consistencia (el core no las bloquea).
pub trait Datastore: Send + Sync {
    /// Devuelve el descriptor del dataset o `None` si el identificador es desconocido.
    fn get_dataset(&self, identifier: &str) -> Option<DatasetDescriptor>;

    /// Registra un dataset nuevo y devuelve su descriptor.
    fn create_dataset(&self, columns: Vec<DatasetColumn>, row_count: u64) -> DatasetDescriptor;
}

/// Datastore en memoria. Los identificadores son UUID v4 (identidad, no contenido).
#[derive(Debug, Default)]
pub struct InMemoryDatastore {
    datasets: DashMap<String, DatasetDescriptor>,
}

impl InMemoryDatastore {
    pub fn new() -> Self { Self::default() }

    /// Registra un descriptor ya construido (p.ej. restaurado de otro almacén).
    pub fn register(&self, descriptor: DatasetDescriptor) {
        self.datasets.insert(descriptor.identifier().to_string(), descriptor);
    }

    pub fn len(&self) -> usize { self.datasets.len() }
    pub fn is_empty(&self) -> bool { self.datasets.is_empty() }
}

impl Datastore for InMemoryDatastore {
    fn get_dataset(&self, identifier: &str) -> Option<DatasetDescriptor> {
        self.datasets.get(identifier).map(|d| d.value().clone())
    }

    fn create_dataset(&self, columns: Vec<DatasetColumn>, row_count: u64) -> DatasetDescriptor {
        let descriptor = DatasetDescriptor::new(Uuid::new_v4().simple().to_string(), columns, row_count);
        self.register(descriptor.clone());
        descriptor
    }
}
