//! Durable record storage and the deduplicating catalog built on top of it.
//!
//! A `RecordStore` is a whole-collection backend: read everything, write
//! everything. `Catalog` layers merge semantics on any backend and keeps the
//! authoritative in-memory copy when a write fails.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::merge::{reconcile, MergeOutcome};
use crate::types::{Record, RecordKey, StoreError, StoreResult};

/// Read a whole JSON file. `Ok(None)` when the file does not exist.
pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| StoreError::json(path, e))
}

/// Write a whole JSON file (2-space pretty print) via a sibling temp file.
pub(crate) fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
    }

    let payload = serde_json::to_vec_pretty(value)?;
    let tmp = tmp_path(path);
    let written = std::fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(&payload)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp, path));

    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("store.json");
    path.with_file_name(format!(".{name}.tmp"))
}

/// Whole-collection persistence backend.
pub trait RecordStore: Send {
    /// Read the full collection as it currently exists in storage.
    fn load(&self) -> StoreResult<Vec<Record>>;
    /// Replace the full collection in storage.
    fn save(&mut self, records: &[Record]) -> StoreResult<()>;
    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// JSON array file backend.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self) -> StoreResult<Vec<Record>> {
        Ok(read_json_file(&self.path)?.unwrap_or_default())
    }

    fn save(&mut self, records: &[Record]) -> StoreResult<()> {
        write_json_file(&self.path, records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process backend. `read_only` makes every save fail.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub records: Vec<Record>,
    pub read_only: bool,
    pub saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> StoreResult<Vec<Record>> {
        Ok(self.records.clone())
    }

    fn save(&mut self, records: &[Record]) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.records = records.to_vec();
        self.saves += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Result of a `Catalog::merge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub outcome: MergeOutcome,
    /// Records in the catalog after the merge.
    pub total: usize,
    /// Whether storage now matches memory.
    pub persisted: bool,
}

/// Deduplicating record collection over a `RecordStore`.
pub struct Catalog<S: RecordStore> {
    backend: S,
    records: Vec<Record>,
    keys: HashSet<RecordKey>,
    dirty: bool,
}

impl<S: RecordStore> Catalog<S> {
    /// Load the current collection from the backend.
    pub fn open(backend: S) -> StoreResult<Self> {
        let records = backend.load()?;
        let keys = records.iter().map(Record::key).collect();
        tracing::info!(
            "Catalog {} opened with {} records",
            backend.describe(),
            records.len()
        );
        Ok(Self {
            backend,
            records,
            keys,
            dirty: false,
        })
    }

    /// Merge candidates against a fresh read of storage and persist if anything
    /// changed.
    ///
    /// A failed read falls back to the in-memory copy. A failed write is logged
    /// and leaves the catalog dirty; memory stays authoritative and the next
    /// merge or `flush` retries.
    pub fn merge(&mut self, candidates: Vec<Record>) -> MergeReport {
        let mut current = match self.backend.load() {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::warn!(
                    "Fresh read of {} failed, merging against memory: {e}",
                    self.backend.describe()
                );
                self.records.clone()
            }
        };

        if self.dirty {
            reconcile(&mut current, self.records.clone());
        }

        let outcome = reconcile(&mut current, candidates);
        let needs_write = outcome.changed() || self.dirty;
        self.set_records(current);

        let persisted = if needs_write {
            self.write()
        } else {
            true
        };

        MergeReport {
            outcome,
            total: self.records.len(),
            persisted,
        }
    }

    /// Replace the whole collection.
    pub fn replace(&mut self, records: Vec<Record>) -> StoreResult<()> {
        self.set_records(records);
        self.dirty = true;
        self.backend.save(&self.records)?;
        self.dirty = false;
        Ok(())
    }

    /// Re-read storage unless unsaved changes are pending.
    pub fn refresh(&mut self) -> StoreResult<()> {
        if self.dirty {
            return Ok(());
        }
        let fresh = self.backend.load()?;
        self.set_records(fresh);
        Ok(())
    }

    /// Retry a pending write.
    pub fn flush(&mut self) -> StoreResult<()> {
        if !self.dirty {
            return Ok(());
        }
        self.backend.save(&self.records)?;
        self.dirty = false;
        Ok(())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    fn set_records(&mut self, records: Vec<Record>) {
        self.keys = records.iter().map(Record::key).collect();
        self.records = records;
    }

    fn write(&mut self) -> bool {
        match self.backend.save(&self.records) {
            Ok(()) => {
                self.dirty = false;
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Could not write {}; keeping {} records in memory: {e}",
                    self.backend.describe(),
                    self.records.len()
                );
                self.dirty = true;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, link: &str, price: f64) -> Record {
        Record {
            category: "Lácteos".into(),
            subcategory: "Leche".into(),
            name: name.into(),
            price,
            image: String::new(),
            link: link.into(),
        }
    }

    #[test]
    fn test_file_roundtrip_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("nested/products.json"));
        assert!(store.load().unwrap().is_empty());

        store.save(&[rec("Gloria", "/gloria/p", 4.2)]).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Gloria");

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with("[\n  {"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(&path, "[{").unwrap();
        let err = Catalog::open(JsonFileStore::new(&path)).err().unwrap();
        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[test]
    fn test_opens_store_written_by_older_ui() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(
            &path,
            r#"[{"name":"Queso","descripcion":"Queso","categoria":"Lacteos","precio":12,"link":null,"imagen":null}]"#,
        )
        .unwrap();

        let mut catalog = Catalog::open(JsonFileStore::new(&path)).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.records()[0].category, "Lacteos");

        let report = catalog.merge(vec![Record {
            category: "Lacteos".into(),
            subcategory: "General".into(),
            name: "Queso".into(),
            price: 12.0,
            image: String::new(),
            link: String::new(),
        }]);
        assert_eq!(report.outcome.duplicates, 1);
        assert_eq!(report.total, 1);
    }

    #[test]
    fn test_merge_writes_only_on_change() {
        let mut catalog = Catalog::open(MemoryStore::new()).unwrap();
        let report = catalog.merge(vec![rec("Gloria", "/gloria/p", 4.2)]);
        assert_eq!(report.outcome.added, 1);
        assert!(report.persisted);
        assert_eq!(catalog.backend().saves, 1);

        let report = catalog.merge(vec![rec("Gloria", "/gloria/p", 4.2)]);
        assert_eq!(report.outcome.duplicates, 1);
        assert_eq!(catalog.backend().saves, 1);
        assert!(catalog.contains(&RecordKey::Link("/gloria/p".into())));
    }

    #[test]
    fn test_merge_reads_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        let mut catalog = Catalog::open(JsonFileStore::new(&path)).unwrap();
        catalog.merge(vec![rec("Gloria", "/gloria/p", 4.2)]);

        // An external writer adds a record behind the catalog's back.
        let mut external = JsonFileStore::new(&path);
        let mut on_disk = external.load().unwrap();
        on_disk.push(rec("Laive", "/laive/p", 3.9));
        external.save(&on_disk).unwrap();

        let report = catalog.merge(vec![rec("Pura Vida", "/pura-vida/p", 3.5)]);
        assert_eq!(report.total, 3);
        let names: Vec<_> = JsonFileStore::new(&path)
            .load()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Gloria", "Laive", "Pura Vida"]);
    }

    #[test]
    fn test_failed_write_keeps_memory_authoritative() {
        let mut catalog = Catalog::open(MemoryStore::read_only()).unwrap();
        let report = catalog.merge(vec![rec("Gloria", "/gloria/p", 4.2)]);
        assert!(!report.persisted);
        assert!(catalog.is_dirty());

        // The next merge still sees the unsaved record.
        let report = catalog.merge(vec![rec("Laive", "/laive/p", 3.9)]);
        assert_eq!(report.outcome.added, 1);
        assert_eq!(report.total, 2);
        assert!(catalog.flush().is_err());
    }

    #[test]
    fn test_replace_and_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        let mut catalog = Catalog::open(JsonFileStore::new(&path)).unwrap();
        catalog
            .replace(vec![rec("A", "/a", 1.0), rec("B", "/b", 2.0)])
            .unwrap();
        assert_eq!(catalog.len(), 2);

        JsonFileStore::new(&path).save(&[rec("C", "/c", 3.0)]).unwrap();
        catalog.refresh().unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains(&RecordKey::Link("/c".into())));
    }
}
