//! Out-of-order write-out of queued candidates.
//!
//! For every candidate the cursor is moved to the following window (when
//! there is one), then to the candidate's own entry, the record is optionally
//! reconstructed, the following window is merged in and the rows are
//! appended. The cursor is put back where the caller left it once per call,
//! not once per candidate; the [`CursorGuard`] does that on every exit path.

use mrec_error::{RecoError, Result};
use mrec_recon::{MuonReconstructor, PrecisionPermit};
use mrec_store::{
    ChannelMasking, CursorGuard, EventCursor, MatchColumns, OutputRow, OutputStore, RowPayload,
    SeekPurpose, with_masking,
};
use mrec_types::{Candidate, CandidateKind, EventCategory, EventRecord, HitWindow, MaskingMode};
use tracing::{debug, debug_span, error, info, warn};

use crate::merge::{OverflowPolicy, merge_windows};
use crate::report::WriteOutReport;

/// Writes queued candidates of one category to an output store.
#[derive(Debug)]
pub struct CandidateWriter {
    reconstructor: MuonReconstructor,
    overflow: OverflowPolicy,
    precision_enabled: bool,
}

impl CandidateWriter {
    #[must_use]
    pub const fn new(
        reconstructor: MuonReconstructor,
        overflow: OverflowPolicy,
        precision_enabled: bool,
    ) -> Self {
        Self {
            reconstructor,
            overflow,
            precision_enabled,
        }
    }

    #[must_use]
    pub const fn reconstructor(&self) -> &MuonReconstructor {
        &self.reconstructor
    }

    /// Write every candidate in `queue` to `output`, in queue order.
    ///
    /// The queue is empty afterwards, whether or not the call succeeds. A
    /// candidate whose reconstruction fails, or that was queued under the
    /// wrong category, is skipped and listed in the report.
    ///
    /// # Errors
    ///
    /// Aborts on the first read failure, failed sub-trigger reload, capacity
    /// rejection or output failure. The cursor is restored in every case.
    pub fn write_out<S, O>(
        &self,
        store: &mut S,
        queue: &mut Vec<Candidate>,
        output: &mut O,
        category: EventCategory,
        precision_permitted: bool,
    ) -> Result<WriteOutReport>
    where
        S: EventCursor + ChannelMasking,
        O: OutputStore + ?Sized,
    {
        let candidates = std::mem::take(queue);
        let span = debug_span!(
            "write_out",
            category = category.as_str(),
            queued = candidates.len(),
            output = output.name()
        );
        let _enter = span.enter();

        let permit = PrecisionPermit::new(self.precision_enabled, precision_permitted);
        let mut report = WriteOutReport::new(category);
        let mut cursor = CursorGuard::save(store);

        for candidate in &candidates {
            report.candidates_processed += 1;
            if candidate.category() != category {
                warn!(
                    entry = candidate.entry,
                    queued_as = category.as_str(),
                    actual = candidate.category().as_str(),
                    "candidate queued under the wrong category, skipping"
                );
                report.record_skip(candidate.entry);
                continue;
            }
            self.write_candidate(&mut cursor, candidate, output, permit, &mut report)?;
        }

        cursor.restore()?;
        info!(
            category = category.as_str(),
            processed = report.candidates_processed,
            rows = report.rows_appended,
            skipped = report.skipped(),
            "write-out finished"
        );
        Ok(report)
    }

    fn write_candidate<S, O>(
        &self,
        cursor: &mut CursorGuard<'_, S>,
        candidate: &Candidate,
        output: &mut O,
        permit: PrecisionPermit,
        report: &mut WriteOutReport,
    ) -> Result<()>
    where
        S: EventCursor + ChannelMasking,
        O: OutputStore + ?Sized,
    {
        let span = debug_span!(
            "candidate",
            entry = candidate.entry,
            sub_trigger = candidate.sub_trigger
        );
        let _enter = span.enter();

        let following = capture_following(cursor, candidate)?;
        let mut primary = load_primary(cursor, candidate)?;

        let muons = match candidate.kind {
            CandidateKind::Muon => {
                match self
                    .reconstructor
                    .reconstruct(&mut primary, permit, candidate.sub_trigger)
                {
                    Ok(results) => results,
                    Err(err) => {
                        warn!(
                            entry = candidate.entry,
                            error = %err,
                            "muon reconstruction failed, skipping candidate"
                        );
                        report.record_skip(candidate.entry);
                        return Ok(());
                    }
                }
            }
            CandidateKind::LowEnergy(_) => Vec::new(),
        };

        if let Some(following) = &following {
            let outcome = merge_windows(&mut primary.hits, following, self.overflow)?;
            report.record_merge(&outcome);
        }

        let matches = MatchColumns::from_candidate(candidate);
        let EventRecord {
            header,
            charge,
            hits,
        } = primary;
        match &candidate.kind {
            CandidateKind::LowEnergy(payload) => {
                output.append_row(OutputRow {
                    header,
                    charge,
                    hits,
                    matches,
                    payload: RowPayload::LowEnergy(payload.clone()),
                })?;
                report.rows_appended += 1;
            }
            CandidateKind::Muon => {
                debug!(tracks = muons.len(), "appending muon rows");
                for result in muons {
                    output.append_row(OutputRow {
                        header,
                        charge,
                        hits: hits.clone(),
                        matches: matches.clone(),
                        payload: RowPayload::Muon(Box::new(result)),
                    })?;
                    report.rows_appended += 1;
                }
            }
        }
        Ok(())
    }
}

/// Copy the hits of the following trigger window, if the candidate has one.
///
/// The lookahead happens before the primary load because loading the primary
/// replaces the record holding these hits. No seek is issued when the cursor
/// already holds an unaltered read of the following entry.
fn capture_following<S: EventCursor>(
    cursor: &mut CursorGuard<'_, S>,
    candidate: &Candidate,
) -> Result<Option<HitWindow>> {
    let Some(next) = candidate.following_entry() else {
        return Ok(None);
    };
    if cursor.position() == next && !cursor.is_altered() {
        debug!(entry = next, "following window already loaded");
    } else if let Err(err) = cursor.seek(next, SeekPurpose::Lookahead) {
        error!(entry = next, error = %err, "lookahead read failed");
        return Err(err);
    }
    Ok(Some(cursor.current().hits.clone()))
}

/// Load the candidate's own trigger and return a working copy of it.
///
/// Muon candidates are loaded with every known-bad channel masked; the prior
/// masking mode is back in force as soon as the load returns.
fn load_primary<S>(cursor: &mut CursorGuard<'_, S>, candidate: &Candidate) -> Result<EventRecord>
where
    S: EventCursor + ChannelMasking,
{
    match candidate.category() {
        EventCategory::Muon => with_masking(cursor, MaskingMode::MASK_ALL_BAD, |masked| {
            seek_primary(masked, candidate)
        })?,
        EventCategory::LowEnergy => seek_primary(cursor, candidate)?,
    }
    Ok(cursor.current().clone())
}

fn seek_primary<S: EventCursor>(
    cursor: &mut CursorGuard<'_, S>,
    candidate: &Candidate,
) -> Result<()> {
    cursor.seek(candidate.entry, SeekPurpose::Primary)?;
    if candidate.sub_trigger == 0 {
        return Ok(());
    }
    let status = cursor.seek_with_timing_gate(candidate.entry, candidate.gate_offset);
    if !status.is_physics() {
        error!(
            entry = candidate.entry,
            sub_trigger = candidate.sub_trigger,
            status = status.code(),
            "sub-trigger reload failed"
        );
        return Err(RecoError::SubTriggerReload {
            entry: candidate.entry,
            status: status.code(),
        });
    }
    Ok(())
}
