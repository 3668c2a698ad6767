//! Reconstruction capabilities consumed by the pipeline.
//!
//! Each trait wraps one fixed fitting algorithm. Implementations read the
//! record they are handed and nothing else; the pipeline decides which of
//! them run and how their outputs combine.

use mrec_error::Result;
use mrec_types::{ChargeSummary, DedxCurve, EntryPoint, EventRecord, Vec3};
use smallvec::SmallVec;

/// Output of the fast directional/vertex selector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SelectorFit {
    pub entry: EntryPoint,
    pub direction: Vec3,
    pub goodness: f32,
    /// Positive for a good fit, negative for a bad one, zero when the
    /// selector hit a condition it does not support.
    pub quality: i32,
}

/// Output of the fast fallback fit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FallbackFit {
    pub entry: EntryPoint,
    pub direction: Vec3,
    pub quality: i32,
}

/// Output of the multi-track fit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiTrackFit {
    /// Track classification; 0 means the fit failed.
    pub class: i32,
    /// One entry point per track found.
    pub tracks: SmallVec<[EntryPoint; 4]>,
    /// Primary direction, shared by every track.
    pub direction: Vec3,
    pub length: f32,
    pub goodness: f32,
}

impl MultiTrackFit {
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Output of the precision fit: an entry point and a second point on the
/// track, from which the direction is derived.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PrecisionFit {
    pub entry: Vec3,
    pub reference: Vec3,
    pub goodness: f32,
}

impl PrecisionFit {
    /// Unit vector from the entry point towards the reference point, or zero
    /// when the two coincide.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        (self.reference - self.entry)
            .normalized()
            .unwrap_or(Vec3::ZERO)
    }
}

/// Track geometry handed to the energy-loss estimators.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackGeometry {
    pub entry: EntryPoint,
    pub direction: Vec3,
    pub length: f32,
}

/// Undoes the upstream saturation correction of the record's charge totals.
///
/// Must be idempotent.
pub trait ChargeCorrection {
    fn undo_saturation(&self, charge: &mut ChargeSummary);
}

pub trait FastSelector {
    /// Fit entry point and direction.
    ///
    /// # Errors
    ///
    /// Returns an error when the fit cannot run on this record at all.
    fn select(&self, record: &EventRecord) -> Result<SelectorFit>;
}

pub trait FastFallback {
    /// Alternate entry point and direction used when the selector's fit is bad.
    ///
    /// # Errors
    ///
    /// Returns an error when the fit cannot run on this record at all.
    fn fit(&self, record: &EventRecord) -> Result<FallbackFit>;
}

pub trait MultiTrackFitter {
    /// Find every track in the record.
    ///
    /// # Errors
    ///
    /// Returns an error when the fit cannot run on this record at all.
    fn fit(&self, record: &EventRecord) -> Result<MultiTrackFit>;
}

/// Slow fit used only when the multi-track fit is weak.
pub trait PrecisionFitter {
    /// # Errors
    ///
    /// Returns an error when the fit cannot run on this record at all.
    fn fit(&self, record: &EventRecord) -> Result<PrecisionFit>;
}

pub trait DedxEstimator {
    /// Energy-loss rate along `track`.
    ///
    /// # Errors
    ///
    /// Returns an error if the estimate cannot be produced, including a curve
    /// of the wrong length.
    fn estimate(&self, record: &EventRecord, track: &TrackGeometry) -> Result<DedxCurve>;
}

/// The full set of capabilities a reconstructor runs.
pub struct ReconStrategies {
    pub charge: Box<dyn ChargeCorrection>,
    pub selector: Box<dyn FastSelector>,
    pub fallback: Box<dyn FastFallback>,
    pub multi_track: Box<dyn MultiTrackFitter>,
    pub precision: Box<dyn PrecisionFitter>,
    /// Binned estimator; result lands in `MuonResult::dedx_binned`.
    pub dedx_binned: Box<dyn DedxEstimator>,
    /// Integrated estimator; result lands in `MuonResult::dedx_integrated`.
    pub dedx_integrated: Box<dyn DedxEstimator>,
}

impl std::fmt::Debug for ReconStrategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconStrategies").finish_non_exhaustive()
    }
}
