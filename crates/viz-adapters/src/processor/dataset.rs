//! `DatasetProcessor`: comandos del paquete `data` sobre un `Datastore`.
//!
//! - `create`: dataset nuevo con las columnas y filas dadas; write = {name}.
//! - `derive`: lee `input`, escribe `output` con las columnas de la entrada
//!   y a lo sumo `rows` filas.
//! - `fail`: siempre falla con `message` en stderr.

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use viz_core::{ModuleOutputs, ModuleProvenance, OutputObject, TaskResult};
use viz_domain::package::DATA_PACKAGE_ID;
use viz_domain::{DatasetColumn, DatasetContext, DatasetDescriptor, Datastore, ModuleCommand};

use super::TaskProcessor;
use crate::error::ProcessorError;

pub struct DatasetProcessor {
    datastore: Arc<dyn Datastore>,
}

impl DatasetProcessor {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self { Self { datastore } }

    fn create(&self, command: &ModuleCommand, context: &DatasetContext) -> Result<TaskResult, ProcessorError> {
        let name = required_str(command, "name")?;
        let columns: Vec<DatasetColumn> = match command.get("columns") {
            Some(Value::Array(items)) => items.iter()
                                              .filter_map(Value::as_str)
                                              .enumerate()
                                              .map(|(i, c)| DatasetColumn::new(i as i64, c))
                                              .collect(),
            Some(Value::String(list)) => list.split(',')
                                             .map(str::trim)
                                             .filter(|c| !c.is_empty())
                                             .enumerate()
                                             .map(|(i, c)| DatasetColumn::new(i as i64, c))
                                             .collect(),
            _ => Vec::new(),
        };
        let rows = command.get_u64("rows").unwrap_or(0);
        let dataset = self.datastore.create_dataset(columns, rows);
        let stdout = format!("created dataset {name} ({} columns, {rows} rows)", dataset.columns().len());
        Ok(finish(context, BTreeMap::new(), name, dataset, stdout))
    }

    fn derive(&self, command: &ModuleCommand, context: &DatasetContext) -> Result<TaskResult, ProcessorError> {
        let input = required_str(command, "input")?;
        let output = required_str(command, "output")?;
        let source = context.get(input)
                            .ok_or_else(|| ProcessorError::UnknownDataset(input.to_string()))?;
        let rows = command.get_u64("rows")
                          .map_or(source.row_count(), |limit| limit.min(source.row_count()));
        let dataset = self.datastore.create_dataset(source.columns().to_vec(), rows);
        let mut read = BTreeMap::new();
        read.insert(input.to_string(), source.identifier().to_string());
        let stdout = format!("derived {output} from {input} ({rows} rows)");
        Ok(finish(context, read, output, dataset, stdout))
    }
}

#[async_trait]
impl TaskProcessor for DatasetProcessor {
    fn get_name(&self) -> &str { "dataset" }
    fn package_id(&self) -> &str { DATA_PACKAGE_ID }

    async fn compute(&self, command: &ModuleCommand, context: &DatasetContext) -> Result<TaskResult, ProcessorError> {
        debug!("dataset processor: {}", command.qualified_name());
        match command.command_id.as_str() {
            "create" => self.create(command, context),
            "derive" => self.derive(command, context),
            "fail" => Err(ProcessorError::Failed(command.get_str("message").unwrap_or("command failed").to_string())),
            other => Err(ProcessorError::UnknownCommand { package_id: DATA_PACKAGE_ID.to_string(),
                                                          command_id: other.to_string() }),
        }
    }
}

fn required_str<'a>(command: &'a ModuleCommand, id: &str) -> Result<&'a str, ProcessorError> {
    command.get_str(id).ok_or_else(|| ProcessorError::MissingArgument(id.to_string()))
}

fn finish(context: &DatasetContext,
          read: BTreeMap<String, String>,
          name: &str,
          dataset: DatasetDescriptor,
          stdout: String)
          -> TaskResult {
    let mut datasets = context.clone();
    datasets.insert(name.to_string(), dataset.clone());
    let mut write = BTreeMap::new();
    write.insert(name.to_string(), dataset);
    TaskResult { finished_at: Some(Utc::now()),
                 datasets: Some(datasets),
                 outputs: Some(ModuleOutputs::new(vec![OutputObject::text(stdout)], vec![])),
                 provenance: Some(ModuleProvenance::new(read, write)) }
}
