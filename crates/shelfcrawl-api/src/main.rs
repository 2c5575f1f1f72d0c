//! shelfcrawl API server entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use shelfcrawl::{Catalog, JsonFileStore};
use shelfcrawl_api::DEFAULT_PORT;

#[derive(Parser)]
#[command(
    name = "shelfcrawl-api",
    about = "shelfcrawl API: save, merge and read the product store over HTTP",
    version
)]
struct Cli {
    /// Listen port. Also reads from PORT env var.
    #[arg(long)]
    port: Option<u16>,

    /// Product store file. Also reads from SHELFCRAWL_STORE env var.
    #[arg(long)]
    store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let port = match cli.port {
        Some(port) => port,
        None => match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("PORT is not a valid port: {raw}"))?,
            Err(_) => DEFAULT_PORT,
        },
    };
    let store = cli
        .store
        .or_else(|| std::env::var("SHELFCRAWL_STORE").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("metro_products.json"));

    let catalog = Catalog::open(JsonFileStore::new(&store))
        .with_context(|| format!("cannot read store {}", store.display()))?;

    shelfcrawl_api::serve(port, shelfcrawl_api::router(catalog)).await
}
