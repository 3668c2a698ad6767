//! The cascading muon reconstruction.
//!
//! Stages, in order:
//!
//! 1. undo the upstream charge-saturation correction;
//! 2. fast selector, whose quality sign decides the next step (zero aborts);
//! 3. fast fallback fit when the selector's fit is bad;
//! 4. multi-track fit, which fixes how many results are emitted;
//! 5. precision fit, gated by [`ReconPolicy::precision_fit_warranted`];
//! 6. both energy-loss estimators for every track, each track on a fresh copy
//!    of the shared result template.

use std::cmp::Ordering;

use mrec_error::{RecoError, Result};
use mrec_types::{EntryPoint, EventRecord, MuonResult, PrecisionFitRecord};
use tracing::{debug, debug_span, warn};

use crate::policy::{PrecisionPermit, ReconPolicy};
use crate::strategy::{MultiTrackFit, ReconStrategies, TrackGeometry};

/// Runs the reconstruction cascade on one record at a time.
#[derive(Debug)]
pub struct MuonReconstructor {
    strategies: ReconStrategies,
    policy: ReconPolicy,
}

impl MuonReconstructor {
    #[must_use]
    pub const fn new(strategies: ReconStrategies, policy: ReconPolicy) -> Self {
        Self { strategies, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &ReconPolicy {
        &self.policy
    }

    /// Reconstruct every track in `record`, one result per track.
    ///
    /// The charge summary of `record` is corrected in place; callers should
    /// pass a working copy rather than the store's loaded record.
    ///
    /// # Errors
    ///
    /// Returns [`RecoError::UnsupportedSelectorState`] when the fast selector
    /// reports a zero quality, or any error raised by a strategy.
    pub fn reconstruct(
        &self,
        record: &mut EventRecord,
        permit: PrecisionPermit,
        sub_trigger: u32,
    ) -> Result<Vec<MuonResult>> {
        let span = debug_span!(
            "reconstruct_muon",
            event = record.header.event_number,
            sub_trigger
        );
        let _enter = span.enter();

        let mut template = MuonResult {
            sub_trigger,
            charge_before: record.charge,
            ..MuonResult::default()
        };
        self.strategies.charge.undo_saturation(&mut record.charge);
        template.charge_after = record.charge;

        self.fast_fit(record, &mut template)?;

        let tracks = self.strategies.multi_track.fit(record)?;
        debug!(
            class = tracks.class,
            tracks = tracks.track_count(),
            goodness = tracks.goodness,
            length = tracks.length,
            "multi-track fit finished"
        );
        if self.policy.is_poor(tracks.goodness) {
            debug!(goodness = tracks.goodness, "multi-track fit is poor");
        }
        template.track_class = tracks.class;
        template.track_entries = tracks.tracks.clone();
        template.track_direction = tracks.direction;
        template.track_length = tracks.length;
        template.track_goodness = tracks.goodness;

        template.precision = self.precision_fit(record, permit, &tracks)?;

        let mut results = Vec::with_capacity(tracks.track_count());
        for (index, own_entry) in tracks.tracks.iter().enumerate() {
            let geometry = track_geometry(index, own_entry, &tracks, &template.precision);
            let mut result = template.clone();
            result.track_index = index;
            result.dedx_binned = self.strategies.dedx_binned.estimate(record, &geometry)?;
            result.dedx_integrated = self
                .strategies
                .dedx_integrated
                .estimate(record, &geometry)?;
            results.push(result);
        }
        debug!(results = results.len(), "muon reconstruction finished");
        Ok(results)
    }

    fn fast_fit(&self, record: &EventRecord, template: &mut MuonResult) -> Result<()> {
        let selected = self.strategies.selector.select(record)?;
        template.entry = selected.entry;
        template.direction = selected.direction;
        template.goodness = selected.goodness;

        match selected.quality.cmp(&0) {
            Ordering::Greater => {
                template.fit_quality = selected.quality;
                template.fallback_used = false;
            }
            Ordering::Less => {
                let fallback = self.strategies.fallback.fit(record)?;
                debug!(
                    selector_quality = selected.quality,
                    fallback_quality = fallback.quality,
                    "fast selector fit is bad, using fallback fit"
                );
                template.entry = fallback.entry;
                template.direction = fallback.direction;
                template.fit_quality = fallback.quality;
                template.fallback_used = true;
            }
            Ordering::Equal => {
                warn!("fast selector returned an unsupported state");
                return Err(RecoError::UnsupportedSelectorState);
            }
        }
        Ok(())
    }

    fn precision_fit(
        &self,
        record: &EventRecord,
        permit: PrecisionPermit,
        tracks: &MultiTrackFit,
    ) -> Result<PrecisionFitRecord> {
        if !self
            .policy
            .precision_fit_warranted(permit, tracks.class, tracks.goodness)
        {
            return Ok(PrecisionFitRecord::default());
        }

        warn!(
            goodness = tracks.goodness,
            "multi-track fit is weak, trying precision fit"
        );
        let fit = self.strategies.precision.fit(record)?;
        let applied = self.policy.precision_fit_accepted(fit.goodness);
        warn!(goodness = fit.goodness, applied, "precision fit finished");
        Ok(PrecisionFitRecord {
            entry: fit.entry,
            direction: fit.direction(),
            goodness: fit.goodness,
            attempted: true,
            applied,
        })
    }
}

/// Geometry fed to the energy-loss estimators for track `index`.
///
/// An accepted precision fit replaces the shared direction for every track
/// and the entry position of track 0 only; the entry time always comes from
/// the multi-track fit.
fn track_geometry(
    index: usize,
    own_entry: &EntryPoint,
    tracks: &MultiTrackFit,
    precision: &PrecisionFitRecord,
) -> TrackGeometry {
    let mut entry = *own_entry;
    let mut direction = tracks.direction;
    if precision.applied {
        direction = precision.direction;
        if index == 0 {
            entry.position = precision.entry;
        }
    }
    TrackGeometry {
        entry,
        direction,
        length: tracks.length,
    }
}
