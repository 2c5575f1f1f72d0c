// Copyright 2026 Shelfcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for crawl telemetry.
//!
//! The orchestrator emits `CrawlEvent`s as tasks start, save and finish.
//! They flow through a `tokio::sync::broadcast` channel to any subscriber
//! (CLI progress output, tests). When no subscriber exists, events are
//! silently dropped.

use serde::{Deserialize, Serialize};

/// A progress event emitted during a crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub event: CrawlEventKind,
}

/// Whether a merge happened mid-pagination or at task end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveLabel {
    Intermediate,
    Final,
}

impl std::fmt::Display for SaveLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Intermediate => write!(f, "Intermediate"),
            Self::Final => write!(f, "Final"),
        }
    }
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CrawlEventKind {
    RunStarted {
        total_tasks: usize,
        started_at: String,
    },
    TaskStarted {
        url: String,
        category: String,
        subcategory: String,
        revisit: bool,
    },
    /// Already in the ledger.
    TaskSkipped { url: String },
    TaskFailed { url: String, reason: String },
    TaskCompleted {
        url: String,
        stop: String,
        items: usize,
        cycles: u32,
    },
    Saved {
        url: String,
        label: SaveLabel,
        added: usize,
        updated: usize,
        duplicates: usize,
        total: usize,
        persisted: bool,
    },
    EngineRecycled { launches: usize },
    /// A non-fatal warning occurred.
    Warning { message: String },
    RunComplete {
        total_tasks: usize,
        completed: usize,
        skipped: usize,
        failed: usize,
        total_records: usize,
        elapsed_ms: u64,
    },
}

/// Sender handle for emitting progress events.
///
/// When no listeners exist, `send()` returns an error which is ignored.
pub type ProgressSender = tokio::sync::broadcast::Sender<CrawlEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<CrawlEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, silently ignoring send errors (which occur when
/// no receivers are listening).
pub fn emit(tx: &Option<ProgressSender>, run_id: &str, seq: &mut u64, event: CrawlEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(CrawlEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            event,
        });
    }
}

/// Per-run emitter carrying the run id and sequence counter.
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    tx: Option<ProgressSender>,
    run_id: String,
    seq: u64,
}

impl ProgressEmitter {
    pub fn new(run_id: impl Into<String>, tx: Option<ProgressSender>) -> Self {
        Self {
            tx,
            run_id: run_id.into(),
            seq: 0,
        }
    }

    /// An emitter with no channel; every event is dropped.
    pub fn disabled() -> Self {
        Self::new("", None)
    }

    pub fn emit(&mut self, event: CrawlEventKind) {
        emit(&self.tx, &self.run_id, &mut self.seq, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = CrawlEvent {
            run_id: "run-1".to_string(),
            seq: 1,
            event: CrawlEventKind::Saved {
                url: "https://shop.test/c".to_string(),
                label: SaveLabel::Final,
                added: 3,
                updated: 1,
                duplicates: 0,
                total: 40,
                persisted: true,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Saved\""));
        assert!(json.contains("Final"));

        let parsed: CrawlEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "run-1");
        assert_eq!(parsed.seq, 1);
    }

    #[test]
    fn test_channel_no_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        emit(
            &Some(tx),
            "test",
            &mut 0,
            CrawlEventKind::Warning {
                message: "test".to_string(),
            },
        );
    }

    #[test]
    fn test_emitter_sequences() {
        let (tx, mut rx) = channel();
        let mut emitter = ProgressEmitter::new("run-7", Some(tx));
        emitter.emit(CrawlEventKind::TaskSkipped { url: "a".into() });
        emitter.emit(CrawlEventKind::TaskSkipped { url: "b".into() });
        assert_eq!(rx.try_recv().unwrap().seq, 1);
        assert_eq!(rx.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn test_disabled_emitter_is_noop() {
        let mut emitter = ProgressEmitter::disabled();
        emitter.emit(CrawlEventKind::Warning {
            message: "ignored".to_string(),
        });
    }

    #[test]
    fn test_save_label_display() {
        assert_eq!(SaveLabel::Intermediate.to_string(), "Intermediate");
        assert_eq!(SaveLabel::Final.to_string(), "Final");
    }
}
