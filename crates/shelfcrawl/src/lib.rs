//! shelfcrawl: task planning, progress ledger, record normalisation and the deduplicating product store.

pub mod candidate;
pub mod image;
pub mod ledger;
pub mod merge;
pub mod price;
pub mod storage;
pub mod taskgraph;
pub mod types;

pub use candidate::{collapse_whitespace, CandidateMode, RawCard};
pub use image::{upgrade_image_url, DEFAULT_HIRES_SIZE};
pub use ledger::{ProgressLedger, VisitDecision};
pub use merge::{reconcile, MergeOutcome};
pub use price::parse_price;
pub use storage::{Catalog, JsonFileStore, MemoryStore, MergeReport, RecordStore};
pub use taskgraph::{flatten, load_categories, load_tasks, CategoryNode, FlattenPolicy, SubcategoryNode};
pub use types::*;
