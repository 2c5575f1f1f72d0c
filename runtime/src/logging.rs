//! Console plus append-only file logging.
//!
//! Every event goes to stderr and to the run log file in parallel. `RUST_LOG`
//! overrides the default level.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Options for `init`.
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Default filter when `RUST_LOG` is unset, e.g. `"info"`.
    pub level: &'a str,
    /// Append-only log file. `None` logs to the console only.
    pub file: Option<&'a Path>,
    /// JSON lines in the file instead of plain text.
    pub json: bool,
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // CDP traffic is noisy below warn
        EnvFilter::new(format!("{level},chromiumoxide=warn,tungstenite=warn"))
    })
}

/// Install the global subscriber. Keep the returned guard alive for the
/// whole process; dropping it stops file output.
pub fn init(options: LogOptions<'_>) -> Result<Option<WorkerGuard>> {
    let console = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_target(false);

    let Some(file) = options.file else {
        Registry::default()
            .with(filter(options.level))
            .with(console)
            .try_init()
            .context("failed to install logger")?;
        return Ok(None);
    };

    let dir = match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let name = file
        .file_name()
        .context("log file path has no file name")?;

    let (writer, guard) = non_blocking(rolling::never(&dir, name));

    if options.json {
        let file_layer = fmt::Layer::new()
            .json()
            .with_writer(writer)
            .with_ansi(false);
        Registry::default()
            .with(filter(options.level))
            .with(console)
            .with(file_layer)
            .try_init()
            .context("failed to install logger")?;
    } else {
        let file_layer = fmt::Layer::new()
            .with_writer(writer)
            .with_target(false)
            .with_ansi(false);
        Registry::default()
            .with(filter(options.level))
            .with(console)
            .with(file_layer)
            .try_init()
            .context("failed to install logger")?;
    }

    Ok(Some(guard))
}
