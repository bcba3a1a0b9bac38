use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use viz_adapters::{build_backend, BackendKind, EngineConfig, ProcessorRegistry};
use viz_core::{CoreEngineError, ProjectEngine, ViztrailHandle, WorkflowHandle};
use viz_domain::{InMemoryDatastore, ModuleCommand};
use viz_persistence::{FsModuleStore, StoreConfig};

const USAGE: &str = "Uso:\n  viz-cli demo [--backend sync|async|queue] [--data-dir <DIR>]\n  viz-cli show [--data-dir <DIR>] [--module <UUID>]";

fn init_logging() {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_target(false))
                                  .with(tracing_subscriber::EnvFilter::try_from_default_env()
                                            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")))
                                  .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let args: Vec<String> = std::env::args().collect();
    let mut engine_config = EngineConfig::from_env();
    let mut store_config = StoreConfig::from_env();
    let mut module: Option<Uuid> = None;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--backend" => {
                i += 1;
                match args.get(i).map(|v| v.parse::<BackendKind>()) {
                    Some(Ok(kind)) => engine_config.backend = kind,
                    _ => {
                        eprintln!("{USAGE}");
                        std::process::exit(2);
                    }
                }
            }
            "--data-dir" => {
                i += 1;
                if let Some(dir) = args.get(i) {
                    store_config.data_dir = PathBuf::from(dir);
                }
            }
            "--module" => {
                i += 1;
                module = args.get(i).and_then(|v| Uuid::parse_str(v).ok());
            }
            _ => {}
        }
        i += 1;
    }
    let store = match FsModuleStore::from_config(&store_config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("[viz show] store error: {e}");
            std::process::exit(5);
        }
    };
    match args.get(1).map(String::as_str) {
        Some("demo") => {
            if let Err(e) = demo(engine_config, store).await {
                eprintln!("[viz demo] error: {e}");
                std::process::exit(5);
            }
        }
        Some("show") => show(&store, module),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
}

/// Sesión guionizada: crea, deriva, borra y reemplaza módulos imprimiendo
/// la historia de la rama al final.
async fn demo(config: EngineConfig, store: Arc<FsModuleStore>) -> Result<(), CoreEngineError> {
    let datastore = Arc::new(InMemoryDatastore::new());
    let processors = ProcessorRegistry::with_builtin(datastore.clone());
    let backend = build_backend(config.backend, processors).map_err(|e| CoreEngineError::Internal(e.to_string()))?;
    let mut properties = BTreeMap::new();
    properties.insert("name".to_string(), serde_json::json!("demo"));
    let viztrail = Arc::new(ViztrailHandle::with_default_branch("local", properties, &config.default_branch));
    let engine = ProjectEngine::builder(viztrail.clone(), backend).datastore(datastore)
                                                                  .module_store(store.clone())
                                                                  .build();
    let Some(branch) = engine.default_branch() else {
        return Err(CoreEngineError::Internal("viztrail without default branch".into()));
    };
    let branch_id = branch.identifier();
    println!("backend={} viztrail={} branch={} store={}",
             config.backend,
             viztrail.identifier(),
             branch_id,
             store.dir().display());

    let people = ModuleCommand::new("data", "create").with_argument("name", "people")
                                                     .with_argument("columns", serde_json::json!(["id", "name", "age"]))
                                                     .with_argument("rows", 100);
    let cities = ModuleCommand::new("data", "create").with_argument("name", "cities")
                                                     .with_argument("columns", serde_json::json!(["id", "city"]))
                                                     .with_argument("rows", 12);
    let sample = ModuleCommand::new("data", "derive").with_argument("input", "people")
                                                     .with_argument("output", "sample")
                                                     .with_argument("rows", 10);
    for command in [people, cities, sample] {
        engine.append_workflow_module(&branch_id, command)?;
        settle(&engine, &branch_id).await?;
    }
    let head = settle(&engine, &branch_id).await?;
    let cities_id = head.modules()[1].identifier();
    engine.delete_workflow_module(&branch_id, &cities_id)?;
    let head = settle(&engine, &branch_id).await?;
    let smaller = ModuleCommand::new("data", "create").with_argument("name", "people")
                                                      .with_argument("columns", serde_json::json!(["id", "name"]))
                                                      .with_argument("rows", 5);
    engine.replace_workflow_module(&branch_id, &head.modules()[0].identifier(), smaller)?;
    settle(&engine, &branch_id).await?;

    for (n, workflow) in branch.workflows().iter().enumerate() {
        print_workflow(n, workflow);
    }
    Ok(())
}

async fn settle(engine: &ProjectEngine, branch_id: &Uuid) -> Result<Arc<WorkflowHandle>, CoreEngineError> {
    viz_adapters::settle(engine, branch_id).await.ok_or(CoreEngineError::UnknownBranch(*branch_id))
}

fn print_workflow(n: usize, workflow: &WorkflowHandle) {
    let descriptor = workflow.descriptor();
    println!("#{n} {:?} {}.{} -> {}",
             descriptor.action,
             descriptor.package_id.as_deref().unwrap_or("-"),
             descriptor.command_id.as_deref().unwrap_or("-"),
             workflow.state());
    for module in workflow.modules() {
        let datasets: Vec<String> = module.datasets()
                                          .iter()
                                          .map(|(name, ds)| format!("{name}={}", ds.row_count()))
                                          .collect();
        println!("    [{}] {} {{{}}}", module.state(), module.external_form(), datasets.join(", "));
    }
}

fn show(store: &FsModuleStore, module: Option<Uuid>) {
    match module {
        Some(id) => match store.load(&id) {
            Ok(record) => match serde_json::to_string_pretty(&record) {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    eprintln!("[viz show] {e}");
                    std::process::exit(5);
                }
            },
            Err(e) => {
                eprintln!("[viz show] module {id}: {e}");
                std::process::exit(4);
            }
        },
        None => match store.list() {
            Ok(records) => {
                for r in records {
                    println!("{} {} {}", r.identifier, r.state, r.external_form);
                }
            }
            Err(e) => {
                eprintln!("[viz show] {e}");
                std::process::exit(5);
            }
        },
    }
}
