//! Report merge boundary.
//!
//! The transport server hands every decoded report to a [`ReportStore`];
//! what happens to it afterwards (merge strategy, retention, indexing) is
//! this collaborator's business, not the transport's.

use parking_lot::Mutex;
use tracing::debug;

use periscope_report::Report;

pub trait ReportStore: Send + Sync {
    /// Merge one decoded report published by `probe_id`.
    fn add(&self, probe_id: &str, report: Report);

    /// The current merged snapshot.
    fn latest(&self) -> Report;
}

/// Single merged report, no history. Reports from any number of probes
/// land here with latest-write-wins semantics per attribute.
#[derive(Default)]
pub struct InMemoryStore {
    merged: Mutex<Report>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportStore for InMemoryStore {
    fn add(&self, probe_id: &str, report: Report) {
        debug!("merging report from probe {probe_id}");
        self.merged.lock().merge(report);
    }

    fn latest(&self) -> Report {
        self.merged.lock().clone()
    }
}
