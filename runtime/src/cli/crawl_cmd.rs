//! `shelfcrawl crawl`: run every task in the category structure.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use shelfcrawl::{load_tasks, CandidateMode, Catalog, CrawlError, JsonFileStore, ProgressLedger};

use super::PathArgs;
use crate::config::{CrawlConfig, SiteProfile, DEFAULT_LOG_FILE};
use crate::crawl::{Harvester, Orchestrator, RunReport};
use crate::progress;
use crate::renderer::chromium::{ChromiumLauncher, ChromiumOptions};

#[derive(Args, Debug, Clone, Default)]
pub struct CrawlArgs {
    #[command(flatten)]
    pub paths: PathArgs,
    /// Append-only run log
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    /// Merge whenever this many new items appeared since the last save
    #[arg(long)]
    pub save_interval: Option<usize>,
    /// Item count that ends pagination after one unchanged scroll
    #[arg(long)]
    pub min_items: Option<usize>,
    /// Relaunch the browser after this many tasks (0 = never)
    #[arg(long)]
    pub recycle_every: Option<usize>,
    /// Navigation timeout in seconds (default: wait indefinitely)
    #[arg(long)]
    pub nav_timeout: Option<u64>,
    /// Require a price for every product
    #[arg(long)]
    pub strict: bool,
    /// Show the browser window
    #[arg(long)]
    pub headed: bool,
    /// Chromium binary to use
    #[arg(long)]
    pub chromium: Option<PathBuf>,
}

impl CrawlArgs {
    pub fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
    }

    pub fn config(&self) -> CrawlConfig {
        let mut config = CrawlConfig::default();
        self.paths.apply(&mut config);
        config.log_file = self.log_file();
        if let Some(n) = self.save_interval {
            config.save_interval = n;
        }
        if let Some(n) = self.min_items {
            config.min_items = n;
        }
        if let Some(n) = self.recycle_every {
            config.recycle_every = n;
        }
        if let Some(secs) = self.nav_timeout {
            config.navigation_timeout = Some(Duration::from_secs(secs));
        }
        if self.strict {
            config.candidate_mode = CandidateMode::Strict;
        }
        config
    }
}

/// Run the crawl. With `json`, progress events are streamed to stdout as
/// JSON lines and the final report is printed as JSON.
pub async fn run(args: &CrawlArgs, json: bool) -> Result<RunReport> {
    let config = args.config();
    let tasks = load_tasks(&config.structure_file, config.flatten_policy)?;

    let catalog = Catalog::open(JsonFileStore::new(&config.store_file)).map_err(|e| {
        CrawlError::Input(format!(
            "cannot read store {}: {e}",
            config.store_file.display()
        ))
    })?;
    let ledger = ProgressLedger::open(&config.ledger_file);
    let harvester = Harvester::new(SiteProfile::default(), config.candidate_mode)
        .map_err(|e| CrawlError::Input(e.to_string()))?;

    let launcher = Arc::new(ChromiumLauncher::new(ChromiumOptions {
        executable: args.chromium.clone(),
        user_agent: config.user_agent.clone(),
        window: config.viewport,
        headless: !args.headed,
    }));

    let (tx, mut rx) = progress::channel();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) if json => {
                    if let Ok(line) = serde_json::to_string(&event) {
                        println!("{line}");
                    }
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("Progress listener skipped {n} events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let run_id = chrono::Utc::now().format("crawl-%Y%m%dT%H%M%S").to_string();
    let mut orchestrator =
        Orchestrator::new(config, harvester, launcher, ledger, catalog).with_progress(run_id, tx);
    let result = orchestrator.run(&tasks).await;
    drop(orchestrator);
    let _ = printer.await;

    let report = result?;
    if json {
        super::print_json(&report);
    } else {
        println!();
        println!("  Tasks:     {}", report.total_tasks);
        println!("  Completed: {}", report.completed);
        println!("  Skipped:   {}", report.skipped);
        println!("  Failed:    {}", report.failed.len());
        for failure in &report.failed {
            println!("    - {} ({})", failure.url, failure.reason);
        }
        println!("  Products:  {}", report.total_records);
    }
    Ok(report)
}
