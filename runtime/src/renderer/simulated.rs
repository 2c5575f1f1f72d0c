//! Scripted in-process rendering backend.
//!
//! Each `SimulatedPage` models a listing that reveals products on scroll
//! and/or through a load-more control, and answers the scripts in
//! `crawl::scripts` the way a real document would.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Launcher, NavigateOptions, RenderError, RenderResult, RenderSurface, Renderer};
use crate::crawl::scripts;

/// Markup flavour served by a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Markup {
    /// Storefront product-summary classes.
    Structural,
    /// Plain anchors and spans without storefront classes.
    Bare,
}

/// Behaviour of one listing page.
#[derive(Debug, Clone)]
pub struct SimulatedPage {
    label: String,
    total: usize,
    initial: usize,
    per_scroll: usize,
    per_click: usize,
    has_button: bool,
    button_outlives_content: bool,
    native_click_works: bool,
    markup: Markup,
    broken_content: bool,
}

impl SimulatedPage {
    /// `total` products labelled `label`, all visible at first paint.
    pub fn new(label: &str, total: usize) -> Self {
        Self {
            label: label.to_string(),
            total,
            initial: total,
            per_scroll: 0,
            per_click: 0,
            has_button: false,
            button_outlives_content: false,
            native_click_works: true,
            markup: Markup::Structural,
            broken_content: false,
        }
    }

    pub fn initially(mut self, visible: usize) -> Self {
        self.initial = visible.min(self.total);
        self
    }

    pub fn reveal_on_scroll(mut self, per_scroll: usize) -> Self {
        self.per_scroll = per_scroll;
        self
    }

    pub fn load_more_button(mut self, per_click: usize) -> Self {
        self.has_button = true;
        self.per_click = per_click;
        self
    }

    /// Keep showing the control after everything is revealed.
    pub fn dead_button(mut self) -> Self {
        self.button_outlives_content = true;
        self
    }

    /// Native clicks do nothing; only script-level clicks reveal products.
    pub fn native_click_ignored(mut self) -> Self {
        self.native_click_works = false;
        self
    }

    pub fn markup(mut self, markup: Markup) -> Self {
        self.markup = markup;
        self
    }

    /// Serialising the document fails.
    pub fn broken_content(mut self) -> Self {
        self.broken_content = true;
        self
    }

    fn slug(&self) -> String {
        self.label.to_lowercase().replace(' ', "-")
    }

    fn render(&self, visible: usize) -> String {
        let mut html = String::from("<html><head><title>listing</title></head><body><div id=\"gallery\">");
        let slug = self.slug();
        for i in 1..=visible {
            let name = format!("{} {i}", self.label);
            let card = match self.markup {
                Markup::Structural => format!(
                    "<section class=\"vtex-product-summary-2-x-element\">\
                     <a class=\"vtex-product-summary-2-x-clearLink\" href=\"/{slug}-{i}/p\">\
                     <img class=\"vtex-product-summary-2-x-imageNormal\" src=\"https://img.test/arquivos/ids/{i}-300-300/{slug}.jpg\"></a>\
                     <span class=\"vtex-product-summary-2-x-productBrand\">{name}</span>\
                     <span class=\"vtex-product-price-1-x-sellingPriceValue\">S/ {i}.90</span>\
                     </section>"
                ),
                Markup::Bare => format!(
                    "<div class=\"tile\"><a href=\"/{slug}-{i}/p\">\
                     <img src=\"https://img.test/{slug}-{i}.jpg\" alt=\"{name}\"></a>\
                     <span>S/ {i}.90</span></div>"
                ),
            };
            html.push_str(&card);
        }
        html.push_str("</div></body></html>");
        html
    }
}

/// URL → page map shared by every surface of a launcher.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSite {
    pages: HashMap<String, SimulatedPage>,
    unreachable: HashSet<String>,
}

impl SimulatedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: SimulatedPage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// Navigation to `url` fails.
    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct Stats {
    launches: AtomicUsize,
    shutdowns: AtomicUsize,
    native_clicks: AtomicUsize,
    script_clicks: AtomicUsize,
    visits: Mutex<Vec<String>>,
}

/// Launcher for `SimulatedRenderer`s over one site.
pub struct SimulatedLauncher {
    site: Arc<SimulatedSite>,
    stats: Arc<Stats>,
}

impl SimulatedLauncher {
    pub fn new(site: SimulatedSite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.stats.launches.load(Ordering::Relaxed)
    }

    pub fn shutdown_count(&self) -> usize {
        self.stats.shutdowns.load(Ordering::Relaxed)
    }

    pub fn native_clicks(&self) -> usize {
        self.stats.native_clicks.load(Ordering::Relaxed)
    }

    pub fn script_clicks(&self) -> usize {
        self.stats.script_clicks.load(Ordering::Relaxed)
    }

    /// URLs navigated to, in order.
    pub fn visits(&self) -> Vec<String> {
        self.stats
            .visits
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Launcher for SimulatedLauncher {
    async fn launch(&self) -> RenderResult<Box<dyn Renderer>> {
        self.stats.launches.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(SimulatedRenderer {
            site: Arc::clone(&self.site),
            stats: Arc::clone(&self.stats),
            active: Arc::new(AtomicUsize::new(0)),
        }))
    }
}

pub struct SimulatedRenderer {
    site: Arc<SimulatedSite>,
    stats: Arc<Stats>,
    active: Arc<AtomicUsize>,
}

#[async_trait]
impl Renderer for SimulatedRenderer {
    async fn new_surface(&self) -> RenderResult<Box<dyn RenderSurface>> {
        self.active.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(SimulatedSurface {
            site: Arc::clone(&self.site),
            stats: Arc::clone(&self.stats),
            active: Arc::clone(&self.active),
            state: Mutex::new(SurfaceState::default()),
        }))
    }

    async fn shutdown(&self) -> RenderResult<()> {
        self.stats.shutdowns.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn active_surfaces(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    url: String,
    page: Option<SimulatedPage>,
    visible: usize,
}

impl SurfaceState {
    fn height(&self) -> usize {
        800 + self.visible * 120
    }

    fn more_remaining(&self) -> bool {
        self.page.as_ref().is_some_and(|p| self.visible < p.total)
    }

    fn reveal(&mut self, count: usize) {
        if let Some(page) = &self.page {
            self.visible = (self.visible + count).min(page.total);
        }
    }

    fn button_present(&self) -> bool {
        self.page
            .as_ref()
            .is_some_and(|p| p.has_button && (self.more_remaining() || p.button_outlives_content))
    }
}

pub struct SimulatedSurface {
    site: Arc<SimulatedSite>,
    stats: Arc<Stats>,
    active: Arc<AtomicUsize>,
    state: Mutex<SurfaceState>,
}

impl SimulatedSurface {
    fn with_state<T>(&self, f: impl FnOnce(&mut SurfaceState) -> T) -> RenderResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RenderError::Script("surface state poisoned".into()))?;
        Ok(f(&mut state))
    }
}

#[async_trait]
impl RenderSurface for SimulatedSurface {
    async fn navigate(&mut self, url: &str, _options: &NavigateOptions) -> RenderResult<()> {
        if let Ok(mut visits) = self.stats.visits.lock() {
            visits.push(url.to_string());
        }
        if self.site.unreachable.contains(url) {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_RESET".into(),
            });
        }
        let page = self
            .site
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| RenderError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            })?;
        self.with_state(|s| {
            s.url = url.to_string();
            s.visible = page.initial;
            s.page = Some(page);
        })
    }

    async fn evaluate(&self, script: &str) -> RenderResult<Value> {
        let stats = Arc::clone(&self.stats);
        self.with_state(|s| {
            if script == scripts::SCROLL_HEIGHT {
                json!(s.height())
            } else if script == scripts::SCROLL_TO_BOTTOM {
                let per_scroll = s.page.as_ref().map_or(0, |p| p.per_scroll);
                s.reveal(per_scroll);
                json!(true)
            } else if script == scripts::SCRIPT_CLICK {
                if !s.button_present() {
                    return json!(false);
                }
                stats.script_clicks.fetch_add(1, Ordering::Relaxed);
                let per_click = s.page.as_ref().map_or(0, |p| p.per_click);
                s.reveal(per_click);
                json!(true)
            } else if script.contains(scripts::LOAD_MORE_ATTR) && script.contains("setAttribute") {
                json!(s.button_present())
            } else if script.starts_with("document.querySelectorAll(") && script.ends_with(".length") {
                json!(s.visible)
            } else {
                Value::Null
            }
        })
    }

    async fn click(&self, selector: &str) -> RenderResult<()> {
        let stats = Arc::clone(&self.stats);
        self.with_state(|s| {
            if selector != scripts::LOAD_MORE_SELECTOR || !s.button_present() {
                return Err(RenderError::Script(format!("{selector} not found")));
            }
            stats.native_clicks.fetch_add(1, Ordering::Relaxed);
            if let Some(page) = &s.page {
                if page.native_click_works {
                    let per_click = page.per_click;
                    s.reveal(per_click);
                }
            }
            Ok(())
        })?
    }

    async fn content(&self) -> RenderResult<String> {
        self.with_state(|s| match &s.page {
            Some(page) if page.broken_content => {
                Err(RenderError::Script("Execution context was destroyed".into()))
            }
            Some(page) => Ok(page.render(s.visible)),
            None => Ok("<html><body></body></html>".into()),
        })?
    }

    async fn current_url(&self) -> RenderResult<String> {
        self.with_state(|s| s.url.clone())
    }

    async fn close(self: Box<Self>) -> RenderResult<()> {
        self.active.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}
