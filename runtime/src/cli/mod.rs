//! CLI subcommand implementations for the shelfcrawl binary.

pub mod crawl_cmd;
pub mod doctor;
pub mod status;
pub mod tasks_cmd;

use std::path::PathBuf;

use clap::Args;
use shelfcrawl::FlattenPolicy;

use crate::config::CrawlConfig;

/// File locations shared by the read-only subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct PathArgs {
    /// Category structure file (JSON)
    #[arg(long)]
    pub structure: Option<PathBuf>,
    /// Product store file (JSON)
    #[arg(long)]
    pub store: Option<PathBuf>,
    /// Completed-URL ledger file (JSON)
    #[arg(long)]
    pub ledger: Option<PathBuf>,
    /// Only emit a category's own page when it has no subcategories
    #[arg(long)]
    pub category_page_when_leaf: bool,
}

impl PathArgs {
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(p) = &self.structure {
            config.structure_file = p.clone();
        }
        if let Some(p) = &self.store {
            config.store_file = p.clone();
        }
        if let Some(p) = &self.ledger {
            config.ledger_file = p.clone();
        }
        if self.category_page_when_leaf {
            config.flatten_policy = FlattenPolicy::CategoryPageWhenLeaf;
        }
    }

    pub fn config(&self) -> CrawlConfig {
        let mut config = CrawlConfig::default();
        self.apply(&mut config);
        config
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}
