use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use viz_adapters::EngineConfig;
use viz_core::ModuleState;
use viz_domain::ModuleCommand;
use vizflow_rust::{Session, VizflowError};

fn create(name: &str, columns: &[&str], rows: u64) -> ModuleCommand {
    ModuleCommand::new("data", "create").with_argument("name", name)
                                        .with_argument("columns", serde_json::json!(columns))
                                        .with_argument("rows", rows)
}

fn derive(input: &str, output: &str, rows: u64) -> ModuleCommand {
    ModuleCommand::new("data", "derive").with_argument("input", input)
                                        .with_argument("output", output)
                                        .with_argument("rows", rows)
}

/// Validación: borrar un módulo que nadie lee no re-ejecuta lo que sigue.
async fn run_skip_validation(config: &EngineConfig) -> Result<(), VizflowError> {
    let session = Session::in_memory(config)?;
    session.append(create("people", &["id", "name"], 50)).await?;
    session.append(create("cities", &["id", "city"], 8)).await?;
    let wf = session.append(derive("people", "sample", 5)).await?;
    let before = session.datastore().len();
    let wf = session.delete(&wf.modules()[1].identifier()).await?;
    let after = session.datastore().len();
    println!("delete: {} modules, datasets {before} -> {after}", wf.len());
    if after != before || wf.state() != ModuleState::Success {
        return Err(VizflowError::Runtime("downstream module was re-executed".into()));
    }
    println!("!Validación skip: OK");
    Ok(())
}

/// Validación: reemplazar la fuente re-ejecuta a sus lectores y un fallo
/// cancela el resto.
async fn run_cascade_validation(config: &EngineConfig) -> Result<(), VizflowError> {
    let session = Session::in_memory(config)?;
    let wf = session.append(create("people", &["id"], 50)).await?;
    let source = wf.modules()[0].identifier();
    session.append(derive("people", "sample", 5)).await?;
    let wf = session.replace(&source, create("people", &["id"], 3)).await?;
    let rows = wf.modules()[1].datasets().get("sample").map(|d| d.row_count());
    println!("replace: sample rows = {rows:?}");
    let fail = ModuleCommand::new("data", "fail").with_argument("message", "intentional");
    let wf = session.replace(&wf.modules()[0].identifier(), fail).await?;
    let states: Vec<String> = wf.modules().iter().map(|m| m.state().to_string()).collect();
    println!("fail: [{}]", states.join(", "));
    if rows != Some(3) || wf.modules()[1].state() != ModuleState::Canceled {
        return Err(VizflowError::Runtime("unexpected cascade".into()));
    }
    println!("!Validación cascade: OK");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_target(false))
                                  .with(tracing_subscriber::EnvFilter::try_from_default_env()
                                            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")))
                                  .init();
    let config = EngineConfig::from_env();
    println!("backend = {}", config.backend);
    for result in [run_skip_validation(&config).await, run_cascade_validation(&config).await] {
        if let Err(e) = result {
            eprintln!("validation failed: {e}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
