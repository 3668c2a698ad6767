//! Core data model for matched-event write-out.
//!
//! Everything here is plain data: records loaded from the event store, the
//! candidates queued for write-out, and the per-track muon results handed to
//! the output stores. Behaviour lives in `mrec-store`, `mrec-recon` and
//! `mrec-core`.

pub mod candidate;
pub mod geometry;
pub mod hits;
pub mod muon;
pub mod record;

pub use candidate::{
    Candidate, CandidateKind, EventCategory, HwTimestamp, LowEPayload, MatchedPartner,
};
pub use geometry::{EntryPoint, Vec3};
pub use hits::{Hit, HitArrays, HitWindow, INNER_HIT_CAPACITY, OUTER_HIT_CAPACITY, Subsystem};
pub use muon::{DEDX_BINS, DedxCurve, MuonResult, PrecisionFitRecord};
pub use record::{ChargeSummary, EventHeader, EventRecord, MaskingMode, ReadStatus};
