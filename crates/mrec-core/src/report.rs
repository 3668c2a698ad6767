//! Per-call and per-cycle write-out summaries.

use mrec_error::{RecoError, Result};
use mrec_types::EventCategory;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::merge::MergeOutcome;

/// Summary of one write-out call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutReport {
    pub category: EventCategory,
    /// Candidates taken off the queue and looked at.
    pub candidates_processed: usize,
    pub rows_appended: usize,
    /// Entry numbers of candidates that produced no rows because their
    /// reconstruction failed or they were queued under the wrong category.
    pub skipped_entries: SmallVec<[u64; 4]>,
    pub following_windows_merged: usize,
    /// Following-window hits dropped as overlap with the primary window.
    pub overlap_hits_skipped: usize,
    /// Following-window hits dropped for lack of capacity.
    pub hits_truncated: usize,
}

impl WriteOutReport {
    #[must_use]
    pub fn new(category: EventCategory) -> Self {
        Self {
            category,
            candidates_processed: 0,
            rows_appended: 0,
            skipped_entries: SmallVec::new(),
            following_windows_merged: 0,
            overlap_hits_skipped: 0,
            hits_truncated: 0,
        }
    }

    pub(crate) fn record_merge(&mut self, outcome: &MergeOutcome) {
        self.following_windows_merged += 1;
        self.overlap_hits_skipped += outcome.overlap_skipped();
        self.hits_truncated += outcome.truncated();
    }

    pub(crate) fn record_skip(&mut self, entry: u64) {
        self.skipped_entries.push(entry);
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped_entries.len()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| RecoError::Serialization(format!("write-out report: {err}")))
    }
}

/// Reports of one processing cycle, one per category actually written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub lowe: Option<WriteOutReport>,
    pub muon: Option<WriteOutReport>,
}

impl CycleReport {
    #[must_use]
    pub fn rows_appended(&self) -> usize {
        self.reports().map(|report| report.rows_appended).sum()
    }

    pub fn reports(&self) -> impl Iterator<Item = &WriteOutReport> {
        self.lowe.iter().chain(self.muon.iter())
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lowe.is_none() && self.muon.is_none()
    }
}
