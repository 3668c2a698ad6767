//! Append-only output stores and the row schema they accept.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mrec_error::{RecoError, Result};
use mrec_types::{Candidate, ChargeSummary, EventHeader, HitWindow, LowEPayload, MuonResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::instrumentation;

/// Match-tracking columns appended to every row of both output stores.
///
/// Partner columns are parallel: element `i` of each vector describes the
/// same matched partner. Candidates without partners produce empty vectors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchColumns {
    pub matched_event_numbers: Vec<u32>,
    pub matched_entry_numbers: Vec<u64>,
    pub matched_has_following_window: Vec<bool>,
    pub matched_time_diffs: Vec<f64>,
    pub matched_energies: Vec<f32>,
    pub hw_clock_ticks: u64,
    pub hw_rollovers: u32,
}

impl MatchColumns {
    /// Copy the candidate's match metadata and hardware timestamp.
    #[must_use]
    pub fn from_candidate(candidate: &Candidate) -> Self {
        let partners = &candidate.partners;
        Self {
            matched_event_numbers: partners.iter().map(|p| p.event_number).collect(),
            matched_entry_numbers: partners.iter().map(|p| p.entry_number).collect(),
            matched_has_following_window: partners
                .iter()
                .map(|p| p.has_following_window)
                .collect(),
            matched_time_diffs: partners.iter().map(|p| p.time_diff).collect(),
            matched_energies: partners.iter().map(|p| p.energy).collect(),
            hw_clock_ticks: candidate.timestamp.clock_ticks,
            hw_rollovers: candidate.timestamp.rollovers,
        }
    }

    #[must_use]
    pub fn partner_count(&self) -> usize {
        self.matched_event_numbers.len()
    }
}

/// Category-specific reconstruction branches of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPayload {
    LowEnergy(LowEPayload),
    Muon(Box<MuonResult>),
}

/// One row of an output store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub header: EventHeader,
    pub charge: ChargeSummary,
    /// Primary hits with any following-window hits merged in.
    pub hits: HitWindow,
    pub matches: MatchColumns,
    pub payload: RowPayload,
}

impl OutputRow {
    /// The muon result carried by this row, if it is a muon row.
    #[must_use]
    pub fn muon(&self) -> Option<&MuonResult> {
        match &self.payload {
            RowPayload::Muon(result) => Some(result),
            RowPayload::LowEnergy(_) => None,
        }
    }
}

/// Append-only sink of output rows.
pub trait OutputStore {
    /// Name the store is registered under.
    fn name(&self) -> &str;

    fn append_row(&mut self, row: OutputRow) -> Result<()>;

    /// Rows appended so far.
    fn rows_written(&self) -> u64;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Output store that keeps rows in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutputStore {
    name: String,
    rows: Vec<OutputRow>,
}

impl MemoryOutputStore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<OutputRow> {
        self.rows
    }
}

impl OutputStore for MemoryOutputStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn append_row(&mut self, row: OutputRow) -> Result<()> {
        self.rows.push(row);
        instrumentation::record_row_appended();
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows.len() as u64
    }
}

/// Output store writing one JSON object per line.
#[derive(Debug)]
pub struct JsonlOutputStore<W: Write = BufWriter<File>> {
    name: String,
    writer: W,
    rows_written: u64,
}

impl JsonlOutputStore {
    /// Create (or truncate) `path`.
    pub fn create(name: impl Into<String>, path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(name, BufWriter::new(file)))
    }
}

impl<W: Write> JsonlOutputStore<W> {
    /// Write rows to an already open sink.
    pub fn from_writer(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
            rows_written: 0,
        }
    }
}

impl<W: Write> OutputStore for JsonlOutputStore<W> {
    fn name(&self) -> &str {
        &self.name
    }

    /// The row is serialised in full and handed to the writer as a single
    /// line, so a failed append never leaves part of a row behind.
    fn append_row(&mut self, row: OutputRow) -> Result<()> {
        let mut line = serde_json::to_vec(&row)
            .map_err(|err| RecoError::Serialization(format!("output row: {err}")))?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.rows_written = self.rows_written.saturating_add(1);
        instrumentation::record_row_appended();
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows_written
    }

    fn flush(&mut self) -> Result<()> {
        debug!(store = %self.name, rows = self.rows_written, "flushing output store");
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for JsonlOutputStore<W> {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
