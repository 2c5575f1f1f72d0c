//! Render-and-extract adapter: pulls candidate records off a loaded surface
//! and hands them to the catalog.

use shelfcrawl::{CandidateMode, Catalog, MergeReport, Record, RecordStore, Task};
use url::Url;

use crate::config::SiteProfile;
use crate::extraction::{ExtractionError, StrategyChain};
use crate::progress::{CrawlEventKind, ProgressEmitter, SaveLabel};
use crate::renderer::RenderSurface;

pub struct Harvester {
    profile: SiteProfile,
    strategies: StrategyChain,
    mode: CandidateMode,
}

impl Harvester {
    pub fn new(profile: SiteProfile, mode: CandidateMode) -> Result<Self, ExtractionError> {
        let strategies = StrategyChain::for_profile(&profile)?;
        Ok(Self {
            profile,
            strategies,
            mode,
        })
    }

    pub fn with_strategies(mut self, strategies: StrategyChain) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    /// Candidate records currently on the page, tagged with the task's labels.
    ///
    /// A failure to read the document counts as zero candidates.
    pub async fn extract(&self, surface: &dyn RenderSurface, task: &Task) -> Vec<Record> {
        let html = match surface.content().await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(url = %task.url, "Extraction error: {e}");
                return Vec::new();
            }
        };
        let base = surface
            .current_url()
            .await
            .ok()
            .and_then(|u| Url::parse(&u).ok())
            .or_else(|| Url::parse(&task.url).ok());

        let (cards, strategy) = self.strategies.extract(&html);
        let found = cards.len();
        let records: Vec<Record> = cards
            .into_iter()
            .filter_map(|card| {
                card.into_record(task, base.as_ref(), self.mode, self.profile.hires_size)
            })
            .collect();

        tracing::debug!(
            url = %task.url,
            strategy = strategy.unwrap_or("none"),
            "Extracted {} candidates from {found} cards",
            records.len()
        );
        records
    }

    /// Extract and merge into `catalog`, logging the outcome under `label`.
    pub async fn extract_and_merge<S: RecordStore>(
        &self,
        surface: &dyn RenderSurface,
        task: &Task,
        label: SaveLabel,
        catalog: &mut Catalog<S>,
        progress: &mut ProgressEmitter,
    ) -> MergeReport {
        let records = self.extract(surface, task).await;
        let found = records.len();
        let report = catalog.merge(records);
        let outcome = report.outcome;

        if outcome.changed() {
            let mut parts = Vec::new();
            if outcome.added > 0 {
                parts.push(format!("Added {} new", outcome.added));
            }
            if outcome.updated > 0 {
                parts.push(format!("Updated {} existing", outcome.updated));
            }
            tracing::info!(
                url = %task.url,
                "{label} Save: {}. Total in store: {}",
                parts.join(", "),
                report.total
            );
        } else if outcome.duplicates > 0 {
            tracing::info!(
                url = %task.url,
                "{label} Save: Found {} products but all were identical duplicates.",
                outcome.duplicates
            );
        } else {
            tracing::debug!(url = %task.url, "{label} Save: {found} products found");
        }

        if !report.persisted {
            let message = format!(
                "Persistence write error for {}; {} records kept in memory",
                catalog.describe(),
                report.total
            );
            tracing::warn!("{message}");
            progress.emit(CrawlEventKind::Warning { message });
        }

        progress.emit(CrawlEventKind::Saved {
            url: task.url.clone(),
            label,
            added: outcome.added,
            updated: outcome.updated,
            duplicates: outcome.duplicates,
            total: report.total,
            persisted: report.persisted,
        });
        report
    }
}
