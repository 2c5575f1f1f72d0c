//! Core data types for crawl tasks, product records, and errors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::price::parse_price;

/// Subcategory label used for a category's own listing page.
pub const GENERIC_SUBCATEGORY: &str = "General";

/// Returns true when a subcategory label carries no classification.
///
/// Empty labels, `General` and `uncategorized` (any casing) are all generic.
pub fn is_generic_subcategory(label: &str) -> bool {
    let label = label.trim();
    label.is_empty()
        || label.eq_ignore_ascii_case(GENERIC_SUBCATEGORY)
        || label.eq_ignore_ascii_case("uncategorized")
}

/// One category/subcategory listing page to crawl. Identity is `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub category: String,
    pub subcategory: String,
    pub url: String,
}

impl Task {
    pub fn new(
        category: impl Into<String>,
        subcategory: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            subcategory: subcategory.into(),
            url: url.into(),
        }
    }

    /// Whether this task targets a category's own page rather than a subcategory.
    pub fn is_generic(&self) -> bool {
        is_generic_subcategory(&self.subcategory)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} > {} ({})", self.category, self.subcategory, self.url)
    }
}

/// A product as stored. The older UI field names are accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredRecord")]
pub struct Record {
    pub category: String,
    pub subcategory: String,
    pub name: String,
    pub price: f64,
    pub image: String,
    pub link: String,
}

fn default_subcategory() -> String {
    GENERIC_SUBCATEGORY.to_string()
}

/// Store entry as written by any past writer: canonical and legacy keys may
/// both be present, and any of them may be `null`.
#[derive(Deserialize)]
struct StoredRecord {
    category: Option<String>,
    categoria: Option<String>,
    subcategory: Option<String>,
    name: Option<String>,
    descripcion: Option<String>,
    price: Option<serde_json::Value>,
    precio: Option<serde_json::Value>,
    image: Option<String>,
    imagen: Option<String>,
    link: Option<String>,
}

fn stored_price(value: Option<serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => parse_price(&s),
        _ => None,
    }
}

impl From<StoredRecord> for Record {
    fn from(raw: StoredRecord) -> Self {
        Self {
            category: raw.category.or(raw.categoria).unwrap_or_default(),
            subcategory: raw.subcategory.unwrap_or_else(default_subcategory),
            name: raw.name.or(raw.descripcion).unwrap_or_default(),
            price: stored_price(raw.price)
                .or_else(|| stored_price(raw.precio))
                .unwrap_or_default(),
            image: raw.image.or(raw.imagen).unwrap_or_default(),
            link: raw.link.unwrap_or_default(),
        }
    }
}

impl Record {
    /// Dedup key: `link` when present, otherwise `name`.
    pub fn key(&self) -> RecordKey {
        let link = self.link.trim();
        if link.is_empty() {
            RecordKey::Name(self.name.trim().to_string())
        } else {
            RecordKey::Link(link.to_string())
        }
    }
}

/// Identity of a record in the store.
///
/// Links and names live in separate namespaces: a record keyed by link never
/// collides with a link-less record that happens to share the text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Link(String),
    Name(String),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(link) => write!(f, "link:{link}"),
            Self::Name(name) => write!(f, "name:{name}"),
        }
    }
}

/// Errors raised by the durable store and ledger.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store is read-only")]
    ReadOnly,
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub(crate) fn json(path: &std::path::Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Crawl-level error taxonomy.
///
/// Only `Input` and `Launch` are fatal for a run; everything else is handled
/// at task level by the orchestrator.
#[derive(thiserror::Error, Debug)]
pub enum CrawlError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Launch error: {0}")]
    Launch(String),

    #[error("Navigation error for {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Persistence write error for {path}: {reason}")]
    PersistenceWrite { path: String, reason: String },
}

impl CrawlError {
    /// Whether the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Input(_) | Self::Launch(_))
    }
}

/// Convenience result types.
pub type StoreResult<T> = Result<T, StoreError>;
pub type CrawlResult<T> = Result<T, CrawlError>;
