//! Computes a batch of results from JSON files and prints the summary and records.
//!
//! ```text
//! results <contexts.json> [rules.json] [--preview]
//! results tests/fixtures/contexts.json tests/fixtures/rules.json
//! ```
//!
//! Rules default to `RULES_PATH`. Ctrl-C stops the batch after the records already
//! in flight.

use grading::rules::RuleCatalog;
use grading::stores::{InMemoryMarksStore, InMemoryResultStore, InMemoryRuleStore};
use grading::{BatchSelection, EngineOptions, ResultEngine, StudentCourseContext};
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use std::{env, fs, process};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use util::config::AppConfig;

#[tokio::main]
async fn main() {
    let (log_level, log_file, to_stdout) = {
        let config = AppConfig::global();
        (config.log_level.clone(), config.log_file.clone(), config.log_to_stdout)
    };
    if let Err(e) = common::logger::init_logger(&log_level, &log_file, to_stdout) {
        eprintln!("Failed to initialise logging: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "results run failed");
        eprintln!("{e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let preview = args.iter().any(|a| a == "--preview");
    let mut paths = args.iter().filter(|a| !a.starts_with("--"));

    let contexts_path = paths.next().ok_or("usage: results <contexts.json> [rules.json] [--preview]")?;
    let rules_path = match paths.next() {
        Some(path) => path.clone(),
        None => AppConfig::global().rules_path.clone(),
    };

    let contexts: Vec<StudentCourseContext> = serde_json::from_str(&fs::read_to_string(contexts_path)?)?;
    let catalog = RuleCatalog::from_json(&fs::read_to_string(&rules_path)?)?;
    info!(contexts = contexts.len(), rules = %rules_path, preview, "loaded batch input");

    let results = Arc::new(InMemoryResultStore::new());
    let engine = ResultEngine::new(
        Arc::new(InMemoryMarksStore::new(contexts)),
        Arc::new(InMemoryRuleStore::new(catalog)),
        results.clone(),
        EngineOptions::from_app_config(),
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing records in flight");
            on_signal.cancel();
        }
    });

    let selection = BatchSelection {
        calculated_by: env::var("USER").unwrap_or_else(|_| "results-cli".into()),
        persist: !preview,
        ..Default::default()
    };
    let summary = engine.run_batch(&selection, cancel).await?;

    let output = json!({
        "summary": summary,
        "records": results.all().await,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
