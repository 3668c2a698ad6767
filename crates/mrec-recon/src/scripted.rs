//! Deterministic strategies with fixed outputs.
//!
//! Used to drive the pipeline and the write-out path without the real fitting
//! code. The energy-loss estimators encode the geometry they were handed in
//! the first bins of their curve so callers can check which entry point and
//! direction reached them:
//!
//! | bin | value          |
//! |-----|----------------|
//! | 0-2 | entry position |
//! | 3   | entry time     |
//! | 4-6 | direction      |
//! | 7   | track length   |
//!
//! The integrated estimator writes the same layout scaled by `-1`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use mrec_error::{RecoError, Result};
use mrec_types::{ChargeSummary, DEDX_BINS, DedxCurve, EntryPoint, EventRecord, Vec3};
use smallvec::SmallVec;

use crate::strategy::{
    ChargeCorrection, DedxEstimator, FallbackFit, FastFallback, FastSelector, MultiTrackFit,
    MultiTrackFitter, PrecisionFit, PrecisionFitter, ReconStrategies, SelectorFit, TrackGeometry,
};

/// How many times each scripted strategy ran.
#[derive(Debug, Default)]
pub struct ScriptedCalls {
    selector: AtomicU32,
    fallback: AtomicU32,
    multi_track: AtomicU32,
    precision: AtomicU32,
    dedx: AtomicU32,
}

impl ScriptedCalls {
    #[must_use]
    pub fn selector(&self) -> u32 {
        self.selector.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn fallback(&self) -> u32 {
        self.fallback.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn multi_track(&self) -> u32 {
        self.multi_track.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn precision(&self) -> u32 {
        self.precision.load(Ordering::Relaxed)
    }

    /// Estimator invocations, both estimators combined.
    #[must_use]
    pub fn dedx(&self) -> u32 {
        self.dedx.load(Ordering::Relaxed)
    }
}

fn bump(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Builder for a [`ReconStrategies`] set with fixed outputs.
#[derive(Debug, Clone)]
pub struct ScriptedStrategies {
    pub selector: SelectorFit,
    pub fallback: FallbackFit,
    pub multi_track: MultiTrackFit,
    pub precision: PrecisionFit,
    /// Largest single-channel charge left by the correction undo.
    pub charge_ceiling: f32,
    /// Make the estimators fail.
    pub fail_dedx: bool,
    calls: Arc<ScriptedCalls>,
}

impl Default for ScriptedStrategies {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedStrategies {
    /// A good selector fit and one single through-going track of goodness 0.8.
    #[must_use]
    pub fn new() -> Self {
        let entry = EntryPoint::new(Vec3::new(0.0, 0.0, 1810.0), 1000.0);
        let direction = Vec3::new(0.0, 0.0, -1.0);
        let mut tracks = SmallVec::new();
        tracks.push(entry);
        Self {
            selector: SelectorFit {
                entry,
                direction,
                goodness: 0.7,
                quality: 1,
            },
            fallback: FallbackFit {
                entry: EntryPoint::new(Vec3::new(100.0, 0.0, 1810.0), 990.0),
                direction: Vec3::new(0.0, 0.6, -0.8),
                quality: 2,
            },
            multi_track: MultiTrackFit {
                class: 1,
                tracks,
                direction,
                length: 3620.0,
                goodness: 0.8,
            },
            precision: PrecisionFit {
                entry: Vec3::new(-50.0, 20.0, 1810.0),
                reference: Vec3::new(-50.0, 20.0, 810.0),
                goodness: 0.5,
            },
            charge_ceiling: f32::INFINITY,
            fail_dedx: false,
            calls: Arc::new(ScriptedCalls::default()),
        }
    }

    #[must_use]
    pub fn with_selector_quality(mut self, quality: i32) -> Self {
        self.selector.quality = quality;
        self
    }

    /// Replace the multi-track outcome.
    #[must_use]
    pub fn with_multi_track(
        mut self,
        class: i32,
        goodness: f32,
        tracks: impl IntoIterator<Item = EntryPoint>,
    ) -> Self {
        self.multi_track.class = class;
        self.multi_track.goodness = goodness;
        self.multi_track.tracks = tracks.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_precision_goodness(mut self, goodness: f32) -> Self {
        self.precision.goodness = goodness;
        self
    }

    #[must_use]
    pub fn with_charge_ceiling(mut self, ceiling: f32) -> Self {
        self.charge_ceiling = ceiling;
        self
    }

    #[must_use]
    pub fn with_failing_dedx(mut self) -> Self {
        self.fail_dedx = true;
        self
    }

    /// Shared call counters; stays valid after [`Self::build`].
    #[must_use]
    pub fn calls(&self) -> Arc<ScriptedCalls> {
        Arc::clone(&self.calls)
    }

    #[must_use]
    pub fn build(self) -> ReconStrategies {
        ReconStrategies {
            charge: Box::new(ClampMaxCharge(self.charge_ceiling)),
            selector: Box::new(FixedSelector(self.selector, Arc::clone(&self.calls))),
            fallback: Box::new(FixedFallback(self.fallback, Arc::clone(&self.calls))),
            multi_track: Box::new(FixedMultiTrack(self.multi_track, Arc::clone(&self.calls))),
            precision: Box::new(FixedPrecision(self.precision, Arc::clone(&self.calls))),
            dedx_binned: Box::new(GeometryEcho {
                scale: 1.0,
                fail: self.fail_dedx,
                calls: Arc::clone(&self.calls),
            }),
            dedx_integrated: Box::new(GeometryEcho {
                scale: -1.0,
                fail: self.fail_dedx,
                calls: self.calls,
            }),
        }
    }
}

struct ClampMaxCharge(f32);

impl ChargeCorrection for ClampMaxCharge {
    fn undo_saturation(&self, charge: &mut ChargeSummary) {
        charge.max = charge.max.min(self.0);
    }
}

struct FixedSelector(SelectorFit, Arc<ScriptedCalls>);

impl FastSelector for FixedSelector {
    fn select(&self, _record: &EventRecord) -> Result<SelectorFit> {
        bump(&self.1.selector);
        Ok(self.0)
    }
}

struct FixedFallback(FallbackFit, Arc<ScriptedCalls>);

impl FastFallback for FixedFallback {
    fn fit(&self, _record: &EventRecord) -> Result<FallbackFit> {
        bump(&self.1.fallback);
        Ok(self.0)
    }
}

struct FixedMultiTrack(MultiTrackFit, Arc<ScriptedCalls>);

impl MultiTrackFitter for FixedMultiTrack {
    fn fit(&self, _record: &EventRecord) -> Result<MultiTrackFit> {
        bump(&self.1.multi_track);
        Ok(self.0.clone())
    }
}

struct FixedPrecision(PrecisionFit, Arc<ScriptedCalls>);

impl PrecisionFitter for FixedPrecision {
    fn fit(&self, _record: &EventRecord) -> Result<PrecisionFit> {
        bump(&self.1.precision);
        Ok(self.0)
    }
}

struct GeometryEcho {
    scale: f32,
    fail: bool,
    calls: Arc<ScriptedCalls>,
}

impl DedxEstimator for GeometryEcho {
    fn estimate(&self, _record: &EventRecord, track: &TrackGeometry) -> Result<DedxCurve> {
        bump(&self.calls.dedx);
        if self.fail {
            return Err(RecoError::internal("scripted dE/dx failure"));
        }
        let echo = [
            track.entry.position.x,
            track.entry.position.y,
            track.entry.position.z,
            track.entry.time,
            track.direction.x,
            track.direction.y,
            track.direction.z,
            track.length,
        ];
        let mut bins = vec![0.0; DEDX_BINS];
        for (bin, value) in bins.iter_mut().zip(echo) {
            *bin = value * self.scale;
        }
        DedxCurve::from_bins(bins)
    }
}

/// Decode the geometry a scripted estimator encoded into `curve`.
#[must_use]
pub fn echoed_geometry(curve: &DedxCurve) -> TrackGeometry {
    let b = curve.bins();
    TrackGeometry {
        entry: EntryPoint::new(Vec3::new(b[0], b[1], b[2]), b[3]),
        direction: Vec3::new(b[4], b[5], b[6]),
        length: b[7],
    }
}
