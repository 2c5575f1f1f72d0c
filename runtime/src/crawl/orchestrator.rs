//! Drives tasks in order through the ledger, the engine lease, the pager and
//! the catalog.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfcrawl::{Catalog, CrawlError, CrawlResult, ProgressLedger, RecordStore, Task, VisitDecision};

use super::adapter::Harvester;
use super::pagination::{Pager, PagerOutcome};
use crate::config::CrawlConfig;
use crate::progress::{CrawlEventKind, ProgressEmitter, ProgressSender};
use crate::renderer::{EngineLease, Launcher, NavigateOptions};

/// A task that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub url: String,
    pub reason: String,
}

/// End-of-run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub total_tasks: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: Vec<TaskFailure>,
    pub total_records: usize,
    pub elapsed_ms: u64,
}

pub struct Orchestrator<S: RecordStore> {
    config: CrawlConfig,
    harvester: Harvester,
    lease: EngineLease,
    ledger: ProgressLedger,
    catalog: Catalog<S>,
    progress: ProgressEmitter,
}

impl<S: RecordStore> Orchestrator<S> {
    pub fn new(
        config: CrawlConfig,
        harvester: Harvester,
        launcher: Arc<dyn Launcher>,
        ledger: ProgressLedger,
        catalog: Catalog<S>,
    ) -> Self {
        let lease = EngineLease::new(launcher, config.recycle_every);
        Self {
            config,
            harvester,
            lease,
            ledger,
            catalog,
            progress: ProgressEmitter::disabled(),
        }
    }

    /// Publish run events on `tx`.
    pub fn with_progress(mut self, run_id: impl Into<String>, tx: ProgressSender) -> Self {
        self.progress = ProgressEmitter::new(run_id, Some(tx));
        self
    }

    /// Crawl `tasks` in order.
    ///
    /// Task-level failures are recorded in the report; only a launch failure
    /// ends the run early with an error.
    pub async fn run(&mut self, tasks: &[Task]) -> CrawlResult<RunReport> {
        let started_at = Utc::now();
        let clock = Instant::now();
        tracing::info!("Start time: {}", started_at.to_rfc3339());
        tracing::info!("Total tasks (URLs) to scrape: {}", tasks.len());
        self.progress.emit(CrawlEventKind::RunStarted {
            total_tasks: tasks.len(),
            started_at: started_at.to_rfc3339(),
        });

        let mut completed = 0;
        let mut skipped = 0;
        let mut failed = Vec::new();

        for task in tasks {
            let revisit = match self.ledger.visit_decision(task) {
                VisitDecision::Skip => {
                    tracing::info!("Skipping already scraped: {}", task.url);
                    self.progress.emit(CrawlEventKind::TaskSkipped {
                        url: task.url.clone(),
                    });
                    skipped += 1;
                    continue;
                }
                VisitDecision::Revisit => {
                    tracing::info!("Re-checking {} category: {} ({})", task.subcategory, task.category, task.url);
                    true
                }
                VisitDecision::Fresh => false,
            };

            if self.lease.recycle_if_due().await {
                self.progress.emit(CrawlEventKind::EngineRecycled {
                    launches: self.lease.launches(),
                });
            }

            tracing::info!(category = %task.category, subcategory = %task.subcategory, "Scraping: {task}");
            self.progress.emit(CrawlEventKind::TaskStarted {
                url: task.url.clone(),
                category: task.category.clone(),
                subcategory: task.subcategory.clone(),
                revisit,
            });

            let result = self.run_task(task).await;
            self.lease.record_use();

            match result {
                Ok(outcome) => {
                    if let Err(e) = self.ledger.mark_done(&task.url) {
                        let message = format!(
                            "Persistence write error for {}: {e}",
                            self.ledger.path().display()
                        );
                        tracing::warn!("{message}");
                        self.progress.emit(CrawlEventKind::Warning { message });
                    }
                    completed += 1;
                    self.progress.emit(CrawlEventKind::TaskCompleted {
                        url: task.url.clone(),
                        stop: outcome.stop.to_string(),
                        items: outcome.items,
                        cycles: outcome.cycles,
                    });
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!("Aborting run: {e}");
                    self.finish().await;
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("Error scraping {}: {e}", task.url);
                    tracing::info!("Skipping this category/subcategory and continuing to next");
                    self.progress.emit(CrawlEventKind::TaskFailed {
                        url: task.url.clone(),
                        reason: e.to_string(),
                    });
                    failed.push(TaskFailure {
                        url: task.url.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.finish().await;

        let report = RunReport {
            started_at,
            total_tasks: tasks.len(),
            completed,
            skipped,
            failed,
            total_records: self.catalog.len(),
            elapsed_ms: clock.elapsed().as_millis() as u64,
        };
        tracing::info!(
            completed = report.completed,
            skipped = report.skipped,
            failed = report.failed.len(),
            "Scraping finished. Total products: {}",
            report.total_records
        );
        for failure in &report.failed {
            tracing::warn!("Failed task {}: {}", failure.url, failure.reason);
        }
        self.progress.emit(CrawlEventKind::RunComplete {
            total_tasks: report.total_tasks,
            completed: report.completed,
            skipped: report.skipped,
            failed: report.failed.len(),
            total_records: report.total_records,
            elapsed_ms: report.elapsed_ms,
        });
        Ok(report)
    }

    async fn run_task(&mut self, task: &Task) -> CrawlResult<PagerOutcome> {
        let mut surface = self
            .lease
            .surface()
            .await
            .map_err(|e| e.into_crawl_error(&task.url))?;

        let options = NavigateOptions {
            wait_until: self.config.wait_until,
            timeout: self.config.navigation_timeout,
        };

        let result = match surface.navigate(&task.url, &options).await {
            Ok(()) => {
                let pager = Pager::new(&self.config, &self.harvester);
                Ok(pager
                    .run(surface.as_ref(), task, &mut self.catalog, &mut self.progress)
                    .await)
            }
            Err(e) => Err(e.into_crawl_error(&task.url)),
        };

        if let Err(e) = surface.close().await {
            tracing::debug!("Error closing surface for {}: {e}", task.url);
        }
        result
    }

    /// Final flushes and engine shutdown.
    async fn finish(&mut self) {
        if let Err(e) = self.catalog.flush() {
            let err = CrawlError::PersistenceWrite {
                path: self.catalog.describe(),
                reason: e.to_string(),
            };
            tracing::error!("{err}; unsaved records will be lost");
        }
        if let Err(e) = self.ledger.flush() {
            tracing::error!("Could not flush ledger {}: {e}", self.ledger.path().display());
        }
        self.lease.shutdown().await;
    }

    pub fn catalog(&self) -> &Catalog<S> {
        &self.catalog
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn lease(&self) -> &EngineLease {
        &self.lease
    }
}
