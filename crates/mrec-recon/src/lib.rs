//! Muon reconstruction for matched-event write-out.
//!
//! [`MuonReconstructor`] runs a fixed cascade over one loaded record: charge
//! correction undo, fast selector with fast fallback, multi-track fit, an
//! optional precision fit, and two energy-loss estimators per track. The
//! numerical fits themselves are supplied through the traits in
//! [`strategy`].

pub mod pipeline;
pub mod policy;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;
pub mod strategy;

pub use pipeline::MuonReconstructor;
pub use policy::{PrecisionPermit, ReconPolicy};
#[cfg(any(test, feature = "test-support"))]
pub use scripted::{ScriptedCalls, ScriptedStrategies, echoed_geometry};
pub use strategy::{
    ChargeCorrection, DedxEstimator, FallbackFit, FastFallback, FastSelector, MultiTrackFit,
    MultiTrackFitter, PrecisionFit, PrecisionFitter, ReconStrategies, SelectorFit, TrackGeometry,
};
