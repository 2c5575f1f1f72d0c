// Copyright 2026 Shelfcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use shelfcrawl::CrawlError;

use shelfcrawl_runtime::cli::{self, crawl_cmd::CrawlArgs, PathArgs};
use shelfcrawl_runtime::logging::{self, LogOptions};

#[derive(Parser)]
#[command(
    name = "shelfcrawl",
    about = "Shelfcrawl: resumable storefront category crawler",
    version,
    after_help = "Run 'shelfcrawl <command> --help' for details on each command.\nRun 'shelfcrawl' with no command to crawl with the built-in settings."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every category and subcategory page (default)
    Crawl(CrawlArgs),
    /// Print the flattened task list without crawling
    Tasks(PathArgs),
    /// Show store size, ledger entries and pending tasks
    Status(PathArgs),
    /// Check environment and diagnose issues
    Doctor(PathArgs),
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

/// Exit code for a failed run: 1 for bad input, 2 when the browser could
/// not be launched.
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<CrawlError>() {
        Some(CrawlError::Launch(_)) => 2,
        _ => 1,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_else(|| Commands::Crawl(CrawlArgs::default()));
    let level = if cli.verbose { "debug" } else { "info" };

    let log_file = match &command {
        Commands::Crawl(args) => Some(args.log_file()),
        _ => None,
    };
    let _guard = logging::init(LogOptions {
        level,
        file: log_file.as_deref(),
        json: false,
    })?;

    let result = match command {
        Commands::Crawl(args) => cli::crawl_cmd::run(&args, cli.json).await.map(|_| ()),
        Commands::Tasks(paths) => cli::tasks_cmd::run(&paths, cli.json).await,
        Commands::Status(paths) => cli::status::run(&paths, cli.json).await,
        Commands::Doctor(paths) => cli::doctor::run(&paths).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "shelfcrawl", &mut std::io::stdout());
            Ok(())
        }
    };

    // 0 = completed (even with failed tasks), 1 = input error, 2 = launch error
    if let Err(e) = &result {
        tracing::error!("{e:#}");
        if cli.json {
            cli::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        drop(_guard);
        std::process::exit(exit_code(e));
    }

    result
}
