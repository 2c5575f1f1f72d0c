//! The crawl pipeline: extraction adapter, pagination engine and orchestrator.

pub mod adapter;
pub mod orchestrator;
pub mod pagination;
pub mod scripts;

pub use adapter::Harvester;
pub use orchestrator::{Orchestrator, RunReport, TaskFailure};
pub use pagination::{Pager, PagerContext, PagerOutcome, PagerState, StopReason};
