//! Chromium-based renderer using chromiumoxide.

use super::{
    Launcher, NavigateOptions, RenderError, RenderResult, RenderSurface, Renderer, WaitUntil,
};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Environment variable naming an explicit browser binary.
pub const CHROMIUM_PATH_ENV: &str = "SHELFCRAWL_CHROMIUM_PATH";

/// Browser executables looked up on `PATH`, in preference order.
const PATH_NAMES: [&str; 3] = ["google-chrome", "chromium", "chromium-browser"];

/// Locations checked before `PATH`: the env override, then a private install
/// under `~/.shelfcrawl/chromium`.
fn preferred_locations() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = std::env::var_os(CHROMIUM_PATH_ENV)
        .map(PathBuf::from)
        .into_iter()
        .collect();

    if let Some(root) = dirs::home_dir().map(|h| h.join(".shelfcrawl").join("chromium")) {
        let bundled = if cfg!(target_os = "macos") {
            "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"
        } else {
            "chrome-linux64/chrome"
        };
        paths.push(root.join(bundled));
        paths.push(root.join("chrome"));
    }
    paths
}

/// Locate a Chromium binary: preferred locations, `PATH`, then the macOS
/// application bundle.
pub fn find_chromium() -> Option<PathBuf> {
    let system_app = cfg!(target_os = "macos")
        .then(|| PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"));

    preferred_locations()
        .into_iter()
        .find(|p| p.is_file())
        .or_else(|| PATH_NAMES.iter().find_map(|name| which::which(name).ok()))
        .or_else(|| system_app.filter(|p| p.is_file()))
}

/// Browser launch settings.
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    /// Explicit binary; `find_chromium` is used when unset.
    pub executable: Option<PathBuf>,
    pub user_agent: String,
    pub window: (u32, u32),
    pub headless: bool,
}

/// Launches headless Chromium instances.
pub struct ChromiumLauncher {
    options: ChromiumOptions,
}

impl ChromiumLauncher {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Launcher for ChromiumLauncher {
    async fn launch(&self) -> RenderResult<Box<dyn Renderer>> {
        let renderer = ChromiumRenderer::launch(&self.options).await?;
        Ok(Box::new(renderer))
    }
}

/// A running Chromium instance.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    pub async fn launch(options: &ChromiumOptions) -> RenderResult<Self> {
        let chrome_path = options
            .executable
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| {
                RenderError::Launch(
                    format!("Chromium not found. Set {CHROMIUM_PATH_ENV} or install Chrome."),
                )
            })?;

        let (width, height) = options.window;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(width, height)
            .viewport(None)
            .arg(format!("--user-agent={}", options.user_agent))
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if options.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| RenderError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // Drive the CDP connection until the browser goes away
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::debug!("Chromium handler event error: {event:?}");
                }
            }
        });

        tracing::info!("Chromium launched");
        Ok(Self {
            browser: Mutex::new(browser),
            handler,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_surface(&self) -> RenderResult<Box<dyn RenderSurface>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Surface(e.to_string()))?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumSurface {
            page: Some(page),
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> RenderResult<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        self.handler.abort();
        closed
            .map(|_| ())
            .map_err(|e| RenderError::Launch(format!("failed to close browser: {e}")))
    }

    fn active_surfaces(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// Poll interval for readiness checks.
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Resource count must hold still this long to count as network idle.
const IDLE_WINDOW: Duration = Duration::from_millis(500);
/// Give up waiting for idle after this long and continue with the page as is.
const IDLE_LIMIT: Duration = Duration::from_secs(15);

/// Whether `document.readyState` satisfies `wait`.
fn ready_state_satisfies(wait: WaitUntil, state: &str) -> bool {
    match wait {
        WaitUntil::DomContentLoaded => matches!(state, "interactive" | "complete"),
        WaitUntil::Load | WaitUntil::NetworkIdle => state == "complete",
    }
}

/// Tracks how long a resource count has stayed unchanged.
#[derive(Debug)]
struct QuietWindow {
    last: Option<u64>,
    since: Instant,
}

impl QuietWindow {
    fn new(now: Instant) -> Self {
        Self { last: None, since: now }
    }

    /// Record an observation; true once the count held still for `IDLE_WINDOW`.
    fn observe(&mut self, count: u64, now: Instant) -> bool {
        if self.last != Some(count) {
            self.last = Some(count);
            self.since = now;
            return false;
        }
        now.duration_since(self.since) >= IDLE_WINDOW
    }
}

async fn eval_value(page: &Page, script: &str) -> RenderResult<serde_json::Value> {
    page.evaluate(script)
        .await
        .map_err(|e| RenderError::Script(e.to_string()))?
        .into_value()
        .map_err(|e| RenderError::Script(format!("failed to convert JS result: {e:?}")))
}

async fn wait_for_ready_state(page: &Page, wait: WaitUntil) -> RenderResult<()> {
    loop {
        let state = eval_value(page, "document.readyState").await?;
        if ready_state_satisfies(wait, state.as_str().unwrap_or_default()) {
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Wait until no new resources have been fetched for `IDLE_WINDOW`.
async fn wait_for_network_idle(page: &Page) -> RenderResult<()> {
    wait_for_ready_state(page, WaitUntil::NetworkIdle).await?;
    let started = Instant::now();
    let mut window = QuietWindow::new(started);
    loop {
        let count = eval_value(page, "performance.getEntriesByType('resource').length")
            .await?
            .as_u64()
            .unwrap_or_default();
        if window.observe(count, Instant::now()) {
            return Ok(());
        }
        if started.elapsed() >= IDLE_LIMIT {
            tracing::debug!("Network still busy after {IDLE_LIMIT:?}, continuing");
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// A single Chromium tab.
pub struct ChromiumSurface {
    page: Option<Page>,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumSurface {
    fn page(&self) -> RenderResult<&Page> {
        self.page.as_ref().ok_or(RenderError::Closed)
    }
}

#[async_trait]
impl RenderSurface for ChromiumSurface {
    async fn navigate(&mut self, url: &str, options: &NavigateOptions) -> RenderResult<()> {
        let page = self.page()?;
        let navigation_error = |reason: String| RenderError::Navigation {
            url: url.to_string(),
            reason,
        };

        let load = async {
            match options.wait_until {
                WaitUntil::Load => {
                    page.goto(url).await.map_err(|e| navigation_error(e.to_string()))?;
                }
                WaitUntil::DomContentLoaded => {
                    let response = page
                        .execute(NavigateParams::new(url))
                        .await
                        .map_err(|e| navigation_error(e.to_string()))?;
                    if let Some(reason) = response.result.error_text.clone() {
                        return Err(navigation_error(reason));
                    }
                    wait_for_ready_state(page, WaitUntil::DomContentLoaded).await?;
                }
                WaitUntil::NetworkIdle => {
                    page.goto(url).await.map_err(|e| navigation_error(e.to_string()))?;
                    wait_for_network_idle(page).await?;
                }
            }
            Ok::<(), RenderError>(())
        };

        match options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, load)
                .await
                .map_err(|_| RenderError::Timeout {
                    url: url.to_string(),
                    timeout,
                })?,
            None => load.await,
        }
    }

    async fn evaluate(&self, script: &str) -> RenderResult<serde_json::Value> {
        eval_value(self.page()?, script).await
    }

    async fn click(&self, selector: &str) -> RenderResult<()> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(|e| RenderError::Script(format!("{selector} not found: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| RenderError::Script(format!("click on {selector} failed: {e}")))?;
        Ok(())
    }

    async fn content(&self) -> RenderResult<String> {
        self.page()?
            .content()
            .await
            .map_err(|e| RenderError::Script(format!("failed to get HTML: {e}")))
    }

    async fn current_url(&self) -> RenderResult<String> {
        let url = self
            .page()?
            .url()
            .await
            .map_err(|e| RenderError::Script(format!("failed to get URL: {e}")))?
            .unwrap_or_default();
        Ok(url)
    }

    async fn close(self: Box<Self>) -> RenderResult<()> {
        let mut this = self;
        if let Some(page) = this.page.take() {
            this.active_count.fetch_sub(1, Ordering::Relaxed);
            page.close()
                .await
                .map_err(|e| RenderError::Script(format!("failed to close page: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ChromiumOptions {
        ChromiumOptions {
            executable: None,
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            window: (1366, 768),
            headless: true,
        }
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_evaluate_click() {
        let launcher = ChromiumLauncher::new(options());
        let renderer = launcher.launch().await.expect("failed to launch");
        let mut surface = renderer.new_surface().await.expect("failed to open surface");

        surface
            .navigate(
                "data:text/html,<h1>Hello</h1><button onclick=\"document.title='hit'\">more</button>",
                &NavigateOptions {
                    wait_until: WaitUntil::Load,
                    timeout: Some(Duration::from_secs(10)),
                },
            )
            .await
            .expect("navigation failed");

        let heading = surface
            .evaluate("document.querySelector('h1').textContent")
            .await
            .expect("JS execution failed");
        assert_eq!(heading.as_str().unwrap(), "Hello");

        surface.click("button").await.expect("click failed");
        let title = surface.evaluate("document.title").await.unwrap();
        assert_eq!(title.as_str().unwrap(), "hit");

        let html = surface.content().await.expect("content failed");
        assert!(html.contains("<h1>Hello</h1>"));

        surface.close().await.expect("close failed");
        assert_eq!(renderer.active_surfaces(), 0);
        renderer.shutdown().await.expect("shutdown failed");
    }

    #[test]
    fn test_ready_state_per_wait_condition() {
        assert!(ready_state_satisfies(WaitUntil::DomContentLoaded, "interactive"));
        assert!(ready_state_satisfies(WaitUntil::DomContentLoaded, "complete"));
        assert!(!ready_state_satisfies(WaitUntil::DomContentLoaded, "loading"));
        assert!(!ready_state_satisfies(WaitUntil::Load, "interactive"));
        assert!(ready_state_satisfies(WaitUntil::Load, "complete"));
        assert!(!ready_state_satisfies(WaitUntil::NetworkIdle, "interactive"));
    }

    #[test]
    fn test_quiet_window_needs_stable_count() {
        let t0 = Instant::now();
        let mut window = QuietWindow::new(t0);
        assert!(!window.observe(3, t0));
        assert!(!window.observe(3, t0 + Duration::from_millis(300)));
        assert!(!window.observe(5, t0 + Duration::from_millis(600)));
        assert!(!window.observe(5, t0 + Duration::from_millis(900)));
        assert!(window.observe(5, t0 + Duration::from_millis(1100)));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_dom_content_loaded_navigation() {
        let renderer = ChromiumLauncher::new(options()).launch().await.expect("failed to launch");
        let mut surface = renderer.new_surface().await.expect("failed to open surface");
        surface
            .navigate(
                "data:text/html,<p id=\"x\">ready</p>",
                &NavigateOptions {
                    wait_until: WaitUntil::DomContentLoaded,
                    timeout: Some(Duration::from_secs(10)),
                },
            )
            .await
            .expect("navigation failed");
        let text = surface.evaluate("document.getElementById('x').textContent").await.unwrap();
        assert_eq!(text.as_str().unwrap(), "ready");
        surface.close().await.unwrap();
        renderer.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_executable_is_launch_error() {
        if find_chromium().is_some() {
            return;
        }
        let err = ChromiumRenderer::launch(&options()).await.err().unwrap();
        assert!(err.is_launch());
    }
}
