//! Environment readiness check.

use anyhow::Result;
use std::path::Path;
use std::process::Command;

use shelfcrawl::{load_categories, JsonFileStore, RecordStore};

use super::PathArgs;
use crate::renderer::chromium::find_chromium;

/// Check Chromium availability, input/output files, and available memory.
pub async fn run(paths: &PathArgs) -> Result<()> {
    let config = paths.config();

    println!("Shelfcrawl Doctor");
    println!("=================");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or set SHELFCRAWL_CHROMIUM_PATH."
        ),
    }

    let structure_ok = match load_categories(&config.structure_file) {
        Ok(categories) => {
            let subcategories: usize = categories.iter().map(|c| c.subcategories.len()).sum();
            println!(
                "[OK] Structure {}: {} categories, {} subcategories",
                config.structure_file.display(),
                categories.len(),
                subcategories
            );
            true
        }
        Err(e) => {
            println!("[!!] {e}");
            false
        }
    };

    match JsonFileStore::new(&config.store_file).load() {
        Ok(records) => println!(
            "[OK] Store {}: {} products",
            config.store_file.display(),
            records.len()
        ),
        Err(e) => println!("[!!] {e}"),
    }
    check_writable(&config.store_file);
    check_writable(&config.ledger_file);

    match available_memory_mb() {
        Some(mb) if mb >= 512 => println!("[OK] Available memory: {mb}MB (>= 512MB recommended)"),
        Some(mb) => println!("[!!] Available memory: {mb}MB (< 512MB, Chromium may struggle)"),
        None => println!("[??] Could not determine available memory"),
    }

    println!();
    if chromium_path.is_some() && structure_ok {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}

fn check_writable(path: &Path) {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let readonly = std::fs::metadata(dir)
        .map(|m| m.permissions().readonly())
        .unwrap_or(true);
    if readonly {
        println!("[!!] Directory {} is not writable", dir.display());
    } else {
        println!("[OK] {} can be written", path.display());
    }
}

/// Available memory in MB, when the platform reports it.
fn available_memory_mb() -> Option<u64> {
    if cfg!(target_os = "linux") {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        meminfo_available_mb(&meminfo)
    } else if cfg!(target_os = "macos") {
        let output = Command::new("sysctl").args(["-n", "hw.memsize"]).output().ok()?;
        let bytes: u64 = String::from_utf8_lossy(&output.stdout).trim().parse().ok()?;
        Some(bytes / (1024 * 1024))
    } else {
        None
    }
}

/// `MemAvailable` from `/proc/meminfo` text, converted from kB.
fn meminfo_available_mb(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1024)
}
