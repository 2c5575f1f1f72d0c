//! Durable set of completed task URLs.
//!
//! The ledger file is a JSON array of URL strings. It is read once on open and
//! rewritten whole after every `mark_done`, merged with whatever another
//! writer may have put there in the meantime.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::storage::{read_json_file, write_json_file};
use crate::types::{StoreResult, Task};

/// What the orchestrator should do with a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitDecision {
    /// Never completed before.
    Fresh,
    /// Completed before, but a category page is always re-checked.
    Revisit,
    /// Completed before; skip.
    Skip,
}

/// Completed-URL ledger backed by a JSON file.
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    order: Vec<String>,
    done: HashSet<String>,
    dirty: bool,
}

impl ProgressLedger {
    /// Open the ledger, starting empty when the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let order: Vec<String> = match read_json_file(&path) {
            Ok(Some(urls)) => urls,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable ledger {}: {e}", path.display());
                Vec::new()
            }
        };

        let mut ledger = Self {
            path,
            order: Vec::with_capacity(order.len()),
            done: HashSet::with_capacity(order.len()),
            dirty: false,
        };
        for url in order {
            ledger.insert(url);
        }
        tracing::debug!(
            "Ledger {} loaded with {} completed URLs",
            ledger.path.display(),
            ledger.len()
        );
        ledger
    }

    pub fn is_done(&self, url: &str) -> bool {
        self.done.contains(url)
    }

    /// Decide whether a task should run, applying the re-visit override for
    /// generic category pages.
    pub fn visit_decision(&self, task: &Task) -> VisitDecision {
        if !self.is_done(&task.url) {
            VisitDecision::Fresh
        } else if task.is_generic() {
            VisitDecision::Revisit
        } else {
            VisitDecision::Skip
        }
    }

    /// Record a URL as complete and persist the ledger immediately.
    ///
    /// On a write failure the URL stays recorded in memory and the ledger is
    /// marked dirty so a later `flush` can retry.
    pub fn mark_done(&mut self, url: &str) -> StoreResult<()> {
        if self.insert(url.to_string()) {
            self.dirty = true;
        }
        self.flush()
    }

    /// Write pending entries, if any.
    pub fn flush(&mut self) -> StoreResult<()> {
        if !self.dirty {
            return Ok(());
        }

        match read_json_file::<Vec<String>>(&self.path) {
            Ok(Some(on_disk)) => {
                for url in on_disk {
                    self.insert(url);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Ledger re-read failed, overwriting: {e}"),
        }

        write_json_file(&self.path, &self.order)?;
        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Completed URLs in completion order.
    pub fn urls(&self) -> &[String] {
        &self.order
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn insert(&mut self, url: String) -> bool {
        if self.done.insert(url.clone()) {
            self.order.push(url);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_done_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraped_urls.json");

        let mut ledger = ProgressLedger::open(&path);
        assert!(ledger.is_empty());
        ledger.mark_done("https://shop.test/a").unwrap();
        ledger.mark_done("https://shop.test/b").unwrap();
        ledger.mark_done("https://shop.test/a").unwrap();
        drop(ledger);

        let reopened = ProgressLedger::open(&path);
        assert_eq!(reopened.len(), 2);
        assert!(reopened.is_done("https://shop.test/a"));
        assert!(reopened.is_done("https://shop.test/b"));
        assert!(!reopened.is_done("https://shop.test/c"));
    }

    #[test]
    fn test_generic_tasks_are_revisited() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ProgressLedger::open(dir.path().join("ledger.json"));
        let general = Task::new("Bebidas", "General", "https://shop.test/bebidas");
        let specific = Task::new("Bebidas", "Aguas", "https://shop.test/bebidas/aguas");

        assert_eq!(ledger.visit_decision(&general), VisitDecision::Fresh);
        assert_eq!(ledger.visit_decision(&specific), VisitDecision::Fresh);

        ledger.mark_done(&general.url).unwrap();
        ledger.mark_done(&specific.url).unwrap();

        assert_eq!(ledger.visit_decision(&general), VisitDecision::Revisit);
        assert_eq!(ledger.visit_decision(&specific), VisitDecision::Skip);
    }

    #[test]
    fn test_malformed_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "[oops").unwrap();
        let ledger = ProgressLedger::open(&path);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_write_merges_external_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let mut ledger = ProgressLedger::open(&path);
        ledger.mark_done("https://shop.test/a").unwrap();

        // Another process appends its own completion in between.
        std::fs::write(
            &path,
            r#"["https://shop.test/a", "https://shop.test/external"]"#,
        )
        .unwrap();

        ledger.mark_done("https://shop.test/b").unwrap();
        let reopened = ProgressLedger::open(&path);
        assert!(reopened.is_done("https://shop.test/external"));
        assert!(reopened.is_done("https://shop.test/b"));
        assert_eq!(reopened.len(), 3);
    }

    #[test]
    fn test_failed_write_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in place of the file makes every write fail.
        let path = dir.path().join("ledger.json");
        std::fs::create_dir(&path).unwrap();

        let mut ledger = ProgressLedger::open(&path);
        assert!(ledger.mark_done("https://shop.test/a").is_err());
        assert!(ledger.is_done("https://shop.test/a"));
        assert!(ledger.is_dirty());
    }
}
