//! `shelfcrawl tasks`: print the flattened task list without crawling.

use anyhow::Result;
use shelfcrawl::load_tasks;

use super::PathArgs;

pub async fn run(paths: &PathArgs, json: bool) -> Result<()> {
    let config = paths.config();
    let tasks = load_tasks(&config.structure_file, config.flatten_policy)?;

    if json {
        super::print_json(&tasks);
        return Ok(());
    }

    for (i, task) in tasks.iter().enumerate() {
        println!("{:>4}  {} > {}  {}", i + 1, task.category, task.subcategory, task.url);
    }
    println!();
    println!("  {} tasks from {}", tasks.len(), config.structure_file.display());
    Ok(())
}
