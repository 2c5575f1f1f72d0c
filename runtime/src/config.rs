//! Run configuration: file locations, pagination budgets, timings and the
//! site profile describing how a storefront's listing pages are built.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shelfcrawl::{CandidateMode, FlattenPolicy, DEFAULT_HIRES_SIZE};

use crate::renderer::WaitUntil;

pub const DEFAULT_STRUCTURE_FILE: &str = "metro_full_structure.json";
pub const DEFAULT_STORE_FILE: &str = "metro_products.json";
pub const DEFAULT_LEDGER_FILE: &str = "scraped_urls.json";
pub const DEFAULT_LOG_FILE: &str = "scraper.log";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Everything a crawl run needs besides the site profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub structure_file: PathBuf,
    pub store_file: PathBuf,
    pub ledger_file: PathBuf,
    pub log_file: PathBuf,

    /// Merge whenever the on-page count grew by this much since the last save.
    pub save_interval: usize,
    /// Item count that lets pagination stop after one unchanged scroll.
    pub min_items: usize,
    /// Tasks served by one engine instance before it is relaunched.
    pub recycle_every: usize,
    /// Consecutive clicks without growth before the control is declared dead.
    pub stuck_threshold: u32,
    /// Consecutive unchanged scroll heights before giving up below `min_items`.
    pub no_change_threshold: u32,
    /// Hard cap on pagination cycles per task.
    pub max_cycles: u32,

    pub settle_delay: Duration,
    pub scroll_wait: Duration,
    pub click_wait: Duration,
    /// `None` waits indefinitely.
    pub navigation_timeout: Option<Duration>,
    pub wait_until: WaitUntil,

    pub user_agent: String,
    pub viewport: (u32, u32),
    pub flatten_policy: FlattenPolicy,
    pub candidate_mode: CandidateMode,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            structure_file: PathBuf::from(DEFAULT_STRUCTURE_FILE),
            store_file: PathBuf::from(DEFAULT_STORE_FILE),
            ledger_file: PathBuf::from(DEFAULT_LEDGER_FILE),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            save_interval: 20,
            min_items: 40,
            recycle_every: 5,
            stuck_threshold: 3,
            no_change_threshold: 3,
            max_cycles: 500,
            settle_delay: Duration::from_secs(5),
            scroll_wait: Duration::from_secs(3),
            click_wait: Duration::from_secs(5),
            navigation_timeout: None,
            wait_until: WaitUntil::NetworkIdle,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: (1366, 768),
            flatten_policy: FlattenPolicy::AlwaysIncludeCategoryPage,
            candidate_mode: CandidateMode::Lenient,
        }
    }
}

impl CrawlConfig {
    /// Same budgets with every in-page wait removed.
    pub fn without_delays(mut self) -> Self {
        self.settle_delay = Duration::ZERO;
        self.scroll_wait = Duration::ZERO;
        self.click_wait = Duration::ZERO;
        self
    }
}

/// Site-specific markup knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Repeated product card elements.
    pub card_selector: String,
    pub name_selector: String,
    pub price_selector: String,
    pub image_selector: String,
    pub link_selector: String,
    /// Lower-cased text fragments identifying a load-more control.
    pub load_more_texts: Vec<String>,
    /// Class name fragment identifying a load-more control.
    pub load_more_class: String,
    /// Text that marks a price inside free-form card text.
    pub currency_marker: String,
    pub hires_size: u32,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            card_selector:
                ".vtex-product-summary-2-x-element, .vtex-search-result-3-x-galleryItem".into(),
            name_selector: ".vtex-product-summary-2-x-productBrand".into(),
            price_selector: ".vtex-product-price-1-x-sellingPriceValue".into(),
            image_selector: "img.vtex-product-summary-2-x-imageNormal".into(),
            link_selector: "a.vtex-product-summary-2-x-clearLink".into(),
            load_more_texts: ["mostrar más", "ver más", "cargar más", "show more", "load more"]
                .into_iter()
                .map(String::from)
                .collect(),
            load_more_class: "buttonShowMore".into(),
            currency_marker: "S/".into(),
            hires_size: DEFAULT_HIRES_SIZE,
        }
    }
}
