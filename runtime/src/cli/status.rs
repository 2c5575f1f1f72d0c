//! Show crawl progress from the files on disk.

use anyhow::Result;
use serde::Serialize;
use shelfcrawl::{load_tasks, JsonFileStore, ProgressLedger, RecordStore, VisitDecision};

use super::PathArgs;

#[derive(Debug, Serialize)]
struct Status {
    store_records: Option<usize>,
    ledger_entries: usize,
    total_tasks: Option<usize>,
    pending_tasks: Option<usize>,
}

/// Store record count, ledger entries and tasks still to run.
pub async fn run(paths: &PathArgs, json: bool) -> Result<()> {
    let config = paths.config();

    let store_records = match JsonFileStore::new(&config.store_file).load() {
        Ok(records) => Some(records.len()),
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    };
    let ledger = ProgressLedger::open(&config.ledger_file);
    let tasks = match load_tasks(&config.structure_file, config.flatten_policy) {
        Ok(tasks) => Some(tasks),
        Err(e) => {
            tracing::warn!("{e}");
            None
        }
    };
    let pending = tasks.as_ref().map(|tasks| {
        tasks
            .iter()
            .filter(|t| ledger.visit_decision(t) != VisitDecision::Skip)
            .count()
    });

    let status = Status {
        store_records,
        ledger_entries: ledger.len(),
        total_tasks: tasks.as_ref().map(Vec::len),
        pending_tasks: pending,
    };

    if json {
        super::print_json(&status);
        return Ok(());
    }

    let show = |v: Option<usize>| v.map_or_else(|| "unavailable".to_string(), |n| n.to_string());
    println!("Shelfcrawl Status");
    println!("=================");
    println!("Store   {}: {} products", config.store_file.display(), show(status.store_records));
    println!("Ledger  {}: {} completed URLs", config.ledger_file.display(), status.ledger_entries);
    println!(
        "Tasks   {}: {} total, {} to run (category pages are always re-checked)",
        config.structure_file.display(),
        show(status.total_tasks),
        show(status.pending_tasks)
    );
    Ok(())
}
