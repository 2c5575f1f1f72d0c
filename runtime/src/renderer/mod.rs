//! Rendering collaborator abstraction.
//!
//! A `Launcher` starts an engine (`Renderer`), the engine hands out isolated
//! `RenderSurface`s (one browser tab each), and a surface loads a URL and runs
//! scripts against the resulting document. Chromium via chromiumoxide is the
//! production backend; `simulated` provides a scripted stand-in.

pub mod chromium;
pub mod lease;
pub mod simulated;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shelfcrawl::CrawlError;

pub use lease::EngineLease;

/// Errors surfaced by the rendering collaborator.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("failed to launch rendering engine: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("failed to open surface: {0}")]
    Surface(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("surface is closed")]
    Closed,
}

impl RenderError {
    pub fn is_launch(&self) -> bool {
        matches!(self, Self::Launch(_))
    }

    /// Task-boundary view of the error: launch failures stay fatal,
    /// everything else becomes a navigation failure of `url`.
    pub fn into_crawl_error(self, url: &str) -> CrawlError {
        match self {
            Self::Launch(reason) => CrawlError::Launch(reason),
            Self::Navigation { url, reason } => CrawlError::Navigation { url, reason },
            other => CrawlError::Navigation {
                url: url.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

/// Navigation completion condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// The load event fired.
    Load,
    /// The document is parsed; subresources may still be loading.
    DomContentLoaded,
    /// Loaded, and no new resource requests for a short quiet window.
    #[default]
    NetworkIdle,
}

/// Options for `RenderSurface::navigate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    pub wait_until: WaitUntil,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// Starts rendering engines. Called again each time an engine is recycled.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> RenderResult<Box<dyn Renderer>>;
}

/// A running rendering engine.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a fresh surface with its own script-execution context.
    async fn new_surface(&self) -> RenderResult<Box<dyn RenderSurface>>;
    /// Tear the engine down. Surfaces still open become unusable.
    async fn shutdown(&self) -> RenderResult<()>;
    /// Number of surfaces not yet closed.
    fn active_surfaces(&self) -> usize;
}

/// One isolated page.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Load `url` and wait per `options`.
    async fn navigate(&mut self, url: &str, options: &NavigateOptions) -> RenderResult<()>;
    /// Evaluate a script expression and return its JSON-serialisable result.
    async fn evaluate(&self, script: &str) -> RenderResult<serde_json::Value>;
    /// Native (input-event) click on the first element matching `selector`.
    async fn click(&self, selector: &str) -> RenderResult<()>;
    /// Serialised HTML of the current document.
    async fn content(&self) -> RenderResult<String>;
    /// URL of the current document after redirects.
    async fn current_url(&self) -> RenderResult<String>;
    async fn close(self: Box<Self>) -> RenderResult<()>;
}

/// A launcher that always fails. Used when no browser binary is available.
pub struct NoopLauncher;

#[async_trait]
impl Launcher for NoopLauncher {
    async fn launch(&self) -> RenderResult<Box<dyn Renderer>> {
        Err(RenderError::Launch("no browser available".into()))
    }
}
