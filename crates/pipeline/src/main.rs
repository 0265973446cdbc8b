//! docket batch entry point.
//!
//! Usage: `docket <items.json> [--analyze]`
//!
//! The input is either a JSON array of work items or an extracted payload
//! object whose required field lists records. The run report is printed to
//! stdout; logs go to stderr. The exit status is non-zero only when a
//! precondition fails; item failures are reported, not fatal.

use anyhow::{Context, Result, bail};
use docket_client::{DiscoveryMapping, items_from_payload};
use docket_core::{AppConfig, WorkItem};
use docket_pipeline::{Coordinator, PipelineError, RunReport};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: docket <items.json> [--analyze]";

#[derive(Debug)]
struct Args {
    items_path: PathBuf,
    analyze: bool,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Args> {
    let mut items_path = None;
    let mut analyze = false;

    for arg in args {
        match arg.as_str() {
            "--analyze" => analyze = true,
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with("--") => bail!("unknown flag {flag}\n{USAGE}"),
            path if items_path.is_none() => items_path = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument {extra}\n{USAGE}"),
        }
    }

    let items_path = items_path.context(USAGE)?;
    Ok(Args { items_path, analyze })
}

fn parse_items(raw: &str, required_field: &str) -> Result<Vec<WorkItem>> {
    let value: Value = serde_json::from_str(raw).context("items file is not valid JSON")?;
    match value {
        Value::Array(_) => serde_json::from_value(value).context("items array does not hold work items"),
        Value::Object(_) => Ok(items_from_payload(&value, required_field, &DiscoveryMapping::default())),
        _ => bail!("items file must hold an array or an object"),
    }
}

/// Process status: non-zero only when a precondition stopped the run.
fn exit_status<T>(result: &Result<T, PipelineError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(PipelineError::Precondition { .. }) => 1,
    }
}

/// Everything before the first item is a precondition: arguments, config,
/// the items file and the coordinator setup.
async fn run() -> Result<RunReport, PipelineError> {
    let args = parse_args(std::env::args().skip(1))
        .map_err(|e| PipelineError::precondition("arguments", format!("{e:#}")))?;
    let config = AppConfig::load()?;

    let raw = tokio::fs::read_to_string(&args.items_path).await.map_err(|e| {
        PipelineError::precondition("items_path", format!("failed to read {}: {e}", args.items_path.display()))
    })?;
    let items = parse_items(&raw, &config.required_field_name)
        .map_err(|e| PipelineError::precondition("items", format!("{e:#}")))?;

    tracing::info!(items = items.len(), analyze = args.analyze, "starting docket run");

    let coordinator = Coordinator::from_config(&config, args.analyze).await?;
    coordinator.run(items).await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let result = run().await;
    match &result {
        Ok(report) => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "failed to serialize run report"),
        },
        Err(e) => {
            tracing::error!(error = %e, "run aborted before processing items");
            eprintln!("{e}");
        }
    }

    ExitCode::from(exit_status(&result))
}
