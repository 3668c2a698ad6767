//! In-memory event store.
//!
//! Holds every record in a `Vec` and mimics the behaviour of the on-disk
//! reader that matters to write-out: one loaded record, masking applied at
//! load time, gated sub-trigger reloads, and injectable read failures.

use std::collections::{BTreeMap, BTreeSet};

use mrec_error::{RecoError, Result};
use mrec_types::{EventRecord, MaskingMode, ReadStatus};

use crate::cursor::EventCursor;
use crate::masking::ChannelMasking;

/// One load performed by the store, kept for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRecord {
    pub entry: u64,
    /// Masking mode in force during the load.
    pub masking: MaskingMode,
    /// Gate offset for gated reloads.
    pub gate_offset: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    entries: Vec<EventRecord>,
    position: u64,
    current: EventRecord,
    masking: MaskingMode,
    bad_channels: BTreeSet<i32>,
    failing_entries: BTreeSet<u64>,
    gate_statuses: BTreeMap<u64, ReadStatus>,
    loads: Vec<LoadRecord>,
}

impl MemoryEventStore {
    /// Open a store over `entries`, positioned at entry 0.
    #[must_use]
    pub fn new(entries: Vec<EventRecord>) -> Self {
        let current = entries.first().cloned().unwrap_or_default();
        Self {
            entries,
            current,
            ..Self::default()
        }
    }

    /// Channels dropped from loaded records while bad-channel masking is on.
    #[must_use]
    pub fn with_bad_channels(mut self, channels: impl IntoIterator<Item = i32>) -> Self {
        self.bad_channels.extend(channels);
        self
    }

    /// Make every future read of `entry` fail.
    pub fn fail_entry(&mut self, entry: u64) {
        self.failing_entries.insert(entry);
    }

    /// Force the status returned by gated reloads of `entry`.
    pub fn set_gate_status(&mut self, entry: u64, status: ReadStatus) {
        self.gate_statuses.insert(entry, status);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads performed since creation or the last [`Self::clear_loads`].
    #[must_use]
    pub fn loads(&self) -> &[LoadRecord] {
        &self.loads
    }

    pub fn clear_loads(&mut self) {
        self.loads.clear();
    }

    fn load(&mut self, entry: u64, gate_offset: Option<i32>) -> Result<()> {
        if self.failing_entries.contains(&entry) {
            return Err(RecoError::read(entry, "injected read failure"));
        }
        let index = usize::try_from(entry).map_err(|_| RecoError::read(entry, "entry overflow"))?;
        let mut record = self
            .entries
            .get(index)
            .cloned()
            .ok_or_else(|| RecoError::read(entry, "entry past end of store"))?;

        if self.masking.masks_bad_channels() && !self.bad_channels.is_empty() {
            let bad = &self.bad_channels;
            record.hits.inner.retain(|hit| !bad.contains(&hit.channel));
            record.hits.outer.retain(|hit| !bad.contains(&hit.channel));
        }
        if let Some(offset) = gate_offset {
            let shift = offset as f32;
            record.header.gate_offset = offset;
            record.hits.inner.for_each_mut(|hit| hit.time -= shift);
            record.hits.outer.for_each_mut(|hit| hit.time -= shift);
        }

        self.current = record;
        self.position = entry;
        self.loads.push(LoadRecord {
            entry,
            masking: self.masking,
            gate_offset,
        });
        Ok(())
    }
}

impl EventCursor for MemoryEventStore {
    fn position(&self) -> u64 {
        self.position
    }

    fn current(&self) -> &EventRecord {
        &self.current
    }

    fn seek(&mut self, entry: u64) -> Result<()> {
        self.load(entry, None)
    }

    fn seek_with_timing_gate(&mut self, entry: u64, gate_offset: i32) -> ReadStatus {
        if let Some(status) = self.gate_statuses.get(&entry) {
            if !status.is_physics() {
                return *status;
            }
        }
        match self.load(entry, Some(gate_offset)) {
            Ok(()) => ReadStatus::Physics,
            Err(_) => ReadStatus::Error,
        }
    }
}

impl ChannelMasking for MemoryEventStore {
    fn masking_mode(&self) -> MaskingMode {
        self.masking
    }

    fn set_masking_mode(&mut self, mode: MaskingMode) {
        self.masking = mode;
    }
}
