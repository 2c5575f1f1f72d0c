//! Pagination engine: scrolls and clicks load-more controls until the listing
//! stops growing, merging incrementally along the way.
//!
//! ```text
//! Loading ─► Scrolling ─► Clicking ─► Scrolling ...
//!                │            └─(stuck ≥ threshold)─► Done(DeadControl)
//!                └─(height unchanged)─► Stalled ─► Scrolling | Done
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shelfcrawl::{Catalog, RecordStore, Task};

use super::adapter::Harvester;
use super::scripts;
use crate::config::CrawlConfig;
use crate::progress::{ProgressEmitter, SaveLabel};
use crate::renderer::RenderSurface;

/// Why pagination ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Minimum item count met and nothing more to load.
    TargetReached,
    /// No growth after the allowed number of unchanged scrolls.
    Exhausted,
    /// The load-more control stopped adding items.
    DeadControl,
    /// Cycle cap hit while the page was still changing.
    CycleLimit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target reached"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::DeadControl => write!(f, "dead load-more control"),
            Self::CycleLimit => write!(f, "cycle limit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    Loading,
    Scrolling,
    Clicking,
    Stalled,
    Done(StopReason),
}

/// Mutable per-task counters. Never shared between tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagerContext {
    pub previous_height: Option<u64>,
    pub no_change: u32,
    pub stuck: u32,
    pub item_count: usize,
    pub last_saved_count: usize,
    pub cycles: u32,
    pub saves: usize,
}

/// Result of paginating one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerOutcome {
    pub stop: StopReason,
    pub cycles: u32,
    /// Item count at termination.
    pub items: usize,
    /// Merge passes performed, including the final one.
    pub saves: usize,
}

pub struct Pager<'a> {
    config: &'a CrawlConfig,
    harvester: &'a Harvester,
    count_script: String,
    find_script: String,
}

impl<'a> Pager<'a> {
    pub fn new(config: &'a CrawlConfig, harvester: &'a Harvester) -> Self {
        Self {
            config,
            harvester,
            count_script: scripts::count_items(harvester.profile()),
            find_script: scripts::find_load_more(harvester.profile()),
        }
    }

    /// Drive `surface` (already navigated to `task.url`) to completion and
    /// perform the final merge.
    pub async fn run<S: RecordStore>(
        &self,
        surface: &dyn RenderSurface,
        task: &Task,
        catalog: &mut Catalog<S>,
        progress: &mut ProgressEmitter,
    ) -> PagerOutcome {
        let mut ctx = PagerContext::default();
        let mut state = PagerState::Loading;

        let stop = loop {
            state = match state {
                PagerState::Loading => self.loading(surface, &mut ctx).await,
                PagerState::Scrolling => {
                    self.scrolling(surface, task, catalog, progress, &mut ctx)
                        .await
                }
                PagerState::Clicking => self.clicking(surface, &mut ctx).await,
                PagerState::Stalled => self.stalled(&mut ctx),
                PagerState::Done(reason) => break reason,
            };
        };

        tracing::info!(url = %task.url, cycles = ctx.cycles, items = ctx.item_count, "Pagination finished: {stop}");

        self.harvester
            .extract_and_merge(surface, task, SaveLabel::Final, catalog, progress)
            .await;
        ctx.saves += 1;

        PagerOutcome {
            stop,
            cycles: ctx.cycles,
            items: ctx.item_count,
            saves: ctx.saves,
        }
    }

    async fn loading(&self, surface: &dyn RenderSurface, ctx: &mut PagerContext) -> PagerState {
        pause(self.config.settle_delay).await;
        ctx.item_count = self.count(surface).await.unwrap_or(0);
        PagerState::Scrolling
    }

    async fn scrolling<S: RecordStore>(
        &self,
        surface: &dyn RenderSurface,
        task: &Task,
        catalog: &mut Catalog<S>,
        progress: &mut ProgressEmitter,
        ctx: &mut PagerContext,
    ) -> PagerState {
        if ctx.cycles >= self.config.max_cycles {
            return PagerState::Done(StopReason::CycleLimit);
        }
        ctx.cycles += 1;

        let before = match self.height(surface).await {
            Some(h) => Some(h),
            None => ctx.previous_height,
        };
        if let Err(e) = surface.evaluate(scripts::SCROLL_TO_BOTTOM).await {
            tracing::warn!(url = %task.url, "Scroll error: {e}");
        }
        pause(self.config.scroll_wait).await;

        if let Some(count) = self.count(surface).await {
            ctx.item_count = count;
        }
        tracing::info!(url = %task.url, "Current products loaded: {}", ctx.item_count);

        if ctx.item_count.saturating_sub(ctx.last_saved_count) >= self.config.save_interval {
            self.harvester
                .extract_and_merge(surface, task, SaveLabel::Intermediate, catalog, progress)
                .await;
            ctx.last_saved_count = ctx.item_count;
            ctx.saves += 1;
        }

        if self.load_more_present(surface).await {
            tracing::info!(url = %task.url, "Found load-more control, clicking");
            ctx.previous_height = before;
            return PagerState::Clicking;
        }

        let after = self.height(surface).await;
        ctx.previous_height = after.or(before);
        match (before, after) {
            (Some(b), Some(a)) if a != b => {
                ctx.no_change = 0;
                PagerState::Scrolling
            }
            _ => PagerState::Stalled,
        }
    }

    async fn clicking(&self, surface: &dyn RenderSurface, ctx: &mut PagerContext) -> PagerState {
        let before = ctx.item_count;

        if let Err(e) = surface.click(scripts::LOAD_MORE_SELECTOR).await {
            tracing::debug!("Native click failed: {e}");
        }
        pause(self.config.click_wait).await;
        let mut after = self.count(surface).await.unwrap_or(before);

        if after <= before {
            match surface.evaluate(scripts::SCRIPT_CLICK).await {
                Ok(_) => {
                    pause(self.config.click_wait).await;
                    after = self.count(surface).await.unwrap_or(before);
                }
                Err(e) => tracing::warn!("Error clicking load-more control: {e}"),
            }
        }

        if after > before {
            ctx.item_count = after;
            ctx.stuck = 0;
            ctx.no_change = 0;
            return PagerState::Scrolling;
        }

        ctx.stuck += 1;
        tracing::warn!(
            "Clicked load-more but count did not increase (stuck: {}/{})",
            ctx.stuck,
            self.config.stuck_threshold
        );
        if ctx.stuck >= self.config.stuck_threshold {
            tracing::warn!("Load-more control seems dead, stopping click attempts");
            PagerState::Done(StopReason::DeadControl)
        } else {
            PagerState::Scrolling
        }
    }

    fn stalled(&self, ctx: &mut PagerContext) -> PagerState {
        ctx.no_change += 1;

        if ctx.item_count >= self.config.min_items {
            tracing::info!("Target reached and nothing more to load");
            return PagerState::Done(StopReason::TargetReached);
        }
        if ctx.no_change >= self.config.no_change_threshold {
            tracing::info!("No more products loading after retries");
            return PagerState::Done(StopReason::Exhausted);
        }
        tracing::info!(
            "Reached bottom with {} products (target {}), waiting ({}/{})",
            ctx.item_count,
            self.config.min_items,
            ctx.no_change,
            self.config.no_change_threshold
        );
        PagerState::Scrolling
    }

    async fn count(&self, surface: &dyn RenderSurface) -> Option<usize> {
        match surface.evaluate(&self.count_script).await {
            Ok(value) => value.as_u64().map(|n| n as usize),
            Err(e) => {
                tracing::warn!("Item count failed: {e}");
                None
            }
        }
    }

    async fn height(&self, surface: &dyn RenderSurface) -> Option<u64> {
        match surface.evaluate(scripts::SCROLL_HEIGHT).await {
            Ok(value) => value.as_u64().or_else(|| value.as_f64().map(|h| h as u64)),
            Err(e) => {
                tracing::warn!("Height measurement failed: {e}");
                None
            }
        }
    }

    async fn load_more_present(&self, surface: &dyn RenderSurface) -> bool {
        match surface.evaluate(&self.find_script).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                tracing::warn!("Load-more lookup failed: {e}");
                false
            }
        }
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;
    use crate::progress::{self, CrawlEventKind};
    use crate::renderer::simulated::{SimulatedLauncher, SimulatedPage, SimulatedSite};
    use crate::renderer::{Launcher, NavigateOptions};
    use shelfcrawl::{CandidateMode, MemoryStore};

    const URL: &str = "https://shop.test/lacteos/leche";

    struct Run {
        outcome: PagerOutcome,
        finals: usize,
        intermediates: usize,
        records: usize,
        launcher: SimulatedLauncher,
    }

    async fn paginate(page: SimulatedPage, config: CrawlConfig) -> Run {
        let launcher = SimulatedLauncher::new(SimulatedSite::new().page(URL, page));
        let renderer = launcher.launch().await.unwrap();
        let mut surface = renderer.new_surface().await.unwrap();
        surface.navigate(URL, &NavigateOptions::default()).await.unwrap();

        let harvester = Harvester::new(SiteProfile::default(), CandidateMode::Lenient).unwrap();
        let pager = Pager::new(&config, &harvester);
        let task = Task::new("Lácteos", "Leche", URL);
        let mut catalog = Catalog::open(MemoryStore::new()).unwrap();
        let (tx, mut rx) = progress::channel();
        let mut emitter = ProgressEmitter::new("test", Some(tx));

        let outcome = pager
            .run(surface.as_ref(), &task, &mut catalog, &mut emitter)
            .await;

        let mut finals = 0;
        let mut intermediates = 0;
        while let Ok(event) = rx.try_recv() {
            if let CrawlEventKind::Saved { label, .. } = event.event {
                match label {
                    SaveLabel::Final => finals += 1,
                    SaveLabel::Intermediate => intermediates += 1,
                }
            }
        }
        Run {
            outcome,
            finals,
            intermediates,
            records: catalog.len(),
            launcher,
        }
    }

    fn fast() -> CrawlConfig {
        CrawlConfig::default().without_delays()
    }

    #[tokio::test]
    async fn test_dead_control_stops_within_stuck_threshold() {
        // Two clicks work, then the button keeps showing but adds nothing.
        let page = SimulatedPage::new("Leche", 30)
            .initially(10)
            .load_more_button(10)
            .dead_button();
        let run = paginate(page, fast()).await;

        assert_eq!(run.outcome.stop, StopReason::DeadControl);
        assert_eq!(run.outcome.items, 30);
        assert_eq!(run.finals, 1);
        assert_eq!(run.records, 30);
        // 2 productive native clicks + 3 stuck attempts, each stuck one retried by script
        assert_eq!(run.launcher.native_clicks(), 5);
        assert_eq!(run.launcher.script_clicks(), 3);
        assert_eq!(run.outcome.cycles, 5);
    }

    #[tokio::test]
    async fn test_script_click_fallback() {
        let page = SimulatedPage::new("Leche", 25)
            .initially(5)
            .load_more_button(10)
            .native_click_ignored();
        let run = paginate(page, fast()).await;

        assert_eq!(run.outcome.items, 25);
        assert_eq!(run.launcher.script_clicks(), 2);
        assert_eq!(run.outcome.stop, StopReason::Exhausted);
        assert_eq!(run.records, 25);
    }

    #[tokio::test]
    async fn test_target_reached_after_one_unchanged_scroll() {
        let run = paginate(SimulatedPage::new("Leche", 45), fast()).await;
        assert_eq!(run.outcome.stop, StopReason::TargetReached);
        assert_eq!(run.outcome.cycles, 1);
        assert_eq!(run.finals, 1);
    }

    #[tokio::test]
    async fn test_below_target_waits_for_three_unchanged_scrolls() {
        let run = paginate(SimulatedPage::new("Leche", 12), fast()).await;
        assert_eq!(run.outcome.stop, StopReason::Exhausted);
        assert_eq!(run.outcome.cycles, 3);
        assert_eq!(run.records, 12);
    }

    #[tokio::test]
    async fn test_infinite_scroll_saves_incrementally() {
        let page = SimulatedPage::new("Leche", 60).initially(10).reveal_on_scroll(10);
        let run = paginate(page, fast()).await;

        assert_eq!(run.outcome.items, 60);
        assert_eq!(run.outcome.stop, StopReason::TargetReached);
        // Saves when the count reaches 20, 40 and 60.
        assert_eq!(run.intermediates, 3);
        assert_eq!(run.finals, 1);
        assert_eq!(run.outcome.saves, 4);
        assert_eq!(run.records, 60);
    }

    #[tokio::test]
    async fn test_cycle_cap() {
        let page = SimulatedPage::new("Leche", 1000).initially(1).reveal_on_scroll(1);
        let mut config = fast();
        config.max_cycles = 4;
        let run = paginate(page, config).await;
        assert_eq!(run.outcome.stop, StopReason::CycleLimit);
        assert_eq!(run.outcome.cycles, 4);
        assert_eq!(run.finals, 1);
    }
}
