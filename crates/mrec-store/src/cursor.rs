//! The shared event-store cursor and its scoped save/restore guard.

use mrec_error::Result;
use mrec_types::{EventRecord, MaskingMode, ReadStatus};
use tracing::{debug, error, trace};

use crate::instrumentation;

/// Sequential, randomly seekable record store with one loaded record.
///
/// Seeking replaces the loaded record and may hit disk, so callers should
/// seek as little as possible. The cursor is shared with unrelated consumers
/// that read it between write-out calls.
pub trait EventCursor {
    /// Entry number of the loaded record.
    fn position(&self) -> u64;

    /// The loaded record.
    fn current(&self) -> &EventRecord;

    /// Load `entry`, replacing the current record.
    fn seek(&mut self, entry: u64) -> Result<()>;

    /// Load `entry` and re-read it through the timing gate shifted by
    /// `gate_offset`, returning the low-level read status.
    fn seek_with_timing_gate(&mut self, entry: u64, gate_offset: i32) -> ReadStatus;
}

/// Why a guard is moving the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPurpose {
    /// Prefetching the following trigger window.
    Lookahead,
    /// Loading the candidate's own trigger.
    Primary,
}

impl SeekPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lookahead => "lookahead",
            Self::Primary => "primary",
        }
    }
}

/// Remembers the cursor position on creation and puts it back on drop.
///
/// [`CursorGuard::restore`] restores explicitly and reports seek failures;
/// dropping the guard on an error path restores on a best-effort basis and
/// only logs a failure. The cursor is reseeked when its position moved or
/// when the loaded record is altered: reloaded through a timing gate, or read
/// while the masking mode was overridden. Either leaves other consumers
/// looking at a different record.
pub struct CursorGuard<'a, C: EventCursor> {
    cursor: &'a mut C,
    saved: u64,
    altered: bool,
    masking_baseline: Option<MaskingMode>,
    masking_overridden: bool,
    armed: bool,
}

impl<'a, C: EventCursor> CursorGuard<'a, C> {
    /// Record the cursor's current position.
    pub fn save(cursor: &'a mut C) -> Self {
        let saved = cursor.position();
        trace!(saved, "cursor position saved");
        Self {
            cursor,
            saved,
            altered: false,
            masking_baseline: None,
            masking_overridden: false,
            armed: true,
        }
    }

    /// Position that will be restored.
    #[must_use]
    pub const fn saved_position(&self) -> u64 {
        self.saved
    }

    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    #[must_use]
    pub fn current(&self) -> &EventRecord {
        self.cursor.current()
    }

    /// Whether the loaded record differs from a plain read of its entry.
    #[must_use]
    pub const fn is_altered(&self) -> bool {
        self.altered
    }

    /// Move the cursor to `entry`.
    pub fn seek(&mut self, entry: u64, purpose: SeekPurpose) -> Result<()> {
        debug!(entry, purpose = purpose.as_str(), "seeking event store");
        instrumentation::record_seek();
        if purpose == SeekPurpose::Lookahead {
            instrumentation::record_lookahead_seek();
        }
        self.cursor.seek(entry)?;
        self.altered = self.masking_overridden;
        Ok(())
    }

    /// Re-read `entry` through the timing gate.
    pub fn seek_with_timing_gate(&mut self, entry: u64, gate_offset: i32) -> ReadStatus {
        debug!(entry, gate_offset, "reloading sub-trigger through timing gate");
        instrumentation::record_gated_reload();
        self.altered = true;
        self.cursor.seek_with_timing_gate(entry, gate_offset)
    }

    /// Restore the saved position now, surfacing any seek failure.
    pub fn restore(mut self) -> Result<()> {
        self.armed = false;
        self.restore_inner()
    }

    pub(crate) fn cursor_ref(&self) -> &C {
        self.cursor
    }

    pub(crate) fn cursor_mut(&mut self) -> &mut C {
        self.cursor
    }

    /// Track masking changes made through the guard. The first mode seen is
    /// the baseline; loads under any other mode count as altered.
    pub(crate) fn note_masking_change(&mut self, from: MaskingMode, to: MaskingMode) {
        let baseline = *self.masking_baseline.get_or_insert(from);
        self.masking_overridden = to != baseline;
    }

    fn restore_inner(&mut self) -> Result<()> {
        let position = self.cursor.position();
        if position == self.saved && !self.altered {
            return Ok(());
        }
        debug!(
            from = position,
            to = self.saved,
            altered = self.altered,
            "restoring cursor position"
        );
        instrumentation::record_restore_seek();
        self.cursor.seek(self.saved)?;
        self.altered = false;
        Ok(())
    }
}

impl<C: EventCursor> Drop for CursorGuard<'_, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.restore_inner() {
            error!(saved = self.saved, error = %err, "failed to restore cursor position");
        }
    }
}
