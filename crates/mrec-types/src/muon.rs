//! Per-track muon reconstruction results.

use mrec_error::{RecoError, Result};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geometry::{EntryPoint, Vec3};
use crate::record::ChargeSummary;

/// Number of bins of every energy-loss-rate curve (50 cm steps along the track).
pub const DEDX_BINS: usize = 200;

/// Fixed-length energy-loss-rate curve along a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedxCurve(Vec<f32>);

impl DedxCurve {
    #[must_use]
    pub fn zeroed() -> Self {
        Self(vec![0.0; DEDX_BINS])
    }

    /// Wrap `bins`, which must hold exactly [`DEDX_BINS`] values.
    pub fn from_bins(bins: Vec<f32>) -> Result<Self> {
        if bins.len() != DEDX_BINS {
            return Err(RecoError::out_of_range("dE/dx bin count", bins.len()));
        }
        Ok(Self(bins))
    }

    #[must_use]
    pub fn bins(&self) -> &[f32] {
        &self.0
    }

    /// Summed energy loss over the whole track.
    #[must_use]
    pub fn integral(&self) -> f32 {
        self.0.iter().sum()
    }
}

impl Default for DedxCurve {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Outcome of the slow precision fit. Zero-filled when it was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PrecisionFitRecord {
    pub entry: Vec3,
    pub direction: Vec3,
    pub goodness: f32,
    pub attempted: bool,
    /// Whether the fit's entry/direction replaced the primary track's for
    /// the energy-loss computation.
    pub applied: bool,
}

/// One reconstructed muon track, ready to be appended to the muon store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MuonResult {
    /// Entry point chosen by the fast selector (or its fallback).
    pub entry: EntryPoint,
    pub direction: Vec3,
    /// Goodness of the fast selector.
    pub goodness: f32,
    /// Quality flag of the accepted fast fit (selector, or fallback if used).
    pub fit_quality: i32,
    /// Whether the fast fallback fit replaced the selector's result.
    pub fallback_used: bool,
    /// Charge totals before the saturation correction was undone.
    pub charge_before: ChargeSummary,
    /// Charge totals after the saturation correction was undone.
    pub charge_after: ChargeSummary,
    /// Multi-track classification (stopping, through-going, ...); 0 = failed.
    pub track_class: i32,
    /// Entry points of every track found by the multi-track fit.
    pub track_entries: SmallVec<[EntryPoint; 4]>,
    /// Multi-track primary direction, shared by all tracks.
    pub track_direction: Vec3,
    /// Track length (cm).
    pub track_length: f32,
    pub track_goodness: f32,
    pub precision: PrecisionFitRecord,
    /// Binned energy-loss-rate curve of the first estimator.
    pub dedx_binned: DedxCurve,
    /// Integrated energy-loss-rate curve of the second estimator.
    pub dedx_integrated: DedxCurve,
    pub sub_trigger: u32,
    /// Index of this track within `track_entries`.
    pub track_index: usize,
}

impl MuonResult {
    /// Number of tracks the multi-track fit reported.
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.track_entries.len()
    }

    /// Multi-track entry point of the track this row describes.
    #[must_use]
    pub fn own_track_entry(&self) -> Option<&EntryPoint> {
        self.track_entries.get(self.track_index)
    }
}
