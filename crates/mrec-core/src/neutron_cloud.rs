//! Neutron-cloud summary for written-out muons.
//!
//! Given the capture vertices of the neutrons following a muon, computes the
//! cloud vertex (their mean) and its perpendicular distance to the muon track,
//! and fills three fixed-bin histograms across muons.

use mrec_error::{RecoError, Result};
use mrec_types::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Equal-width histogram over `[lower, upper)` with underflow and overflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedHistogram {
    lower: f64,
    upper: f64,
    counts: Vec<u64>,
    underflow: u64,
    overflow: u64,
}

impl FixedHistogram {
    /// # Errors
    ///
    /// Fails for zero bins or an empty or non-finite range.
    pub fn new(bins: usize, lower: f64, upper: f64) -> Result<Self> {
        if bins == 0 {
            return Err(RecoError::out_of_range("histogram bin count", bins));
        }
        if !(lower.is_finite() && upper.is_finite() && upper > lower) {
            return Err(RecoError::out_of_range(
                "histogram range",
                format!("[{lower}, {upper})"),
            ));
        }
        Ok(Self::uniform(bins, lower, upper))
    }

    fn uniform(bins: usize, lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            counts: vec![0; bins],
            underflow: 0,
            overflow: 0,
        }
    }

    pub fn fill(&mut self, value: f64) {
        if value.is_nan() || value < self.lower {
            self.underflow += 1;
            return;
        }
        if value >= self.upper {
            self.overflow += 1;
            return;
        }
        let width = (self.upper - self.lower) / self.counts.len() as f64;
        let bin = (((value - self.lower) / width) as usize).min(self.counts.len() - 1);
        self.counts[bin] += 1;
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[must_use]
    pub const fn underflow(&self) -> u64 {
        self.underflow
    }

    #[must_use]
    pub const fn overflow(&self) -> u64 {
        self.overflow
    }

    /// All fills, including underflow and overflow.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.counts.iter().sum::<u64>() + self.underflow + self.overflow
    }
}

/// Perpendicular distance from `point` to the line through `entry` along
/// `direction`, or `None` for a zero direction.
#[must_use]
pub fn closest_approach(point: Vec3, entry: Vec3, direction: Vec3) -> Option<f32> {
    let norm2 = direction.dot(direction);
    if norm2 <= 0.0 || !norm2.is_finite() {
        return None;
    }
    let offset = point - entry;
    let along = direction * (offset.dot(direction) / norm2);
    Some((offset - along).norm())
}

/// Cloud derived from one muon's neutrons.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NeutronCloud {
    pub multiplicity: usize,
    /// Mean capture vertex; zero when there are no neutrons.
    pub vertex: Vec3,
    /// Distance from the vertex to the muon track; `None` with no neutrons
    /// or no muon direction.
    pub distance_to_muon: Option<f32>,
}

impl NeutronCloud {
    /// Mean vertex of `captures` and its distance to the muon track.
    #[must_use]
    pub fn from_captures(captures: &[Vec3], muon_entry: Vec3, muon_direction: Vec3) -> Self {
        if captures.is_empty() {
            return Self::default();
        }
        let scale = (captures.len() as f32).recip();
        let vertex = captures
            .iter()
            .fold(Vec3::ZERO, |sum, &capture| sum + capture * scale);
        Self {
            multiplicity: captures.len(),
            vertex,
            distance_to_muon: closest_approach(vertex, muon_entry, muon_direction),
        }
    }
}

/// Histograms and per-muon clouds accumulated over a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeutronCloudSummary {
    pub multiplicity: FixedHistogram,
    pub low_energy_triggers: FixedHistogram,
    /// Cloud-to-track distance (cm).
    pub distance: FixedHistogram,
    pub clouds: Vec<NeutronCloud>,
}

impl Default for NeutronCloudSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl NeutronCloudSummary {
    pub const MULTIPLICITY_BINS: usize = 20;
    pub const TRIGGER_BINS: usize = 20;
    pub const DISTANCE_BINS: usize = 100;
    pub const DISTANCE_UPPER_CM: f64 = 5000.0;

    #[must_use]
    pub fn new() -> Self {
        Self {
            multiplicity: FixedHistogram::uniform(Self::MULTIPLICITY_BINS, 0.0, 20.0),
            low_energy_triggers: FixedHistogram::uniform(Self::TRIGGER_BINS, 0.0, 20.0),
            distance: FixedHistogram::uniform(
                Self::DISTANCE_BINS,
                0.0,
                Self::DISTANCE_UPPER_CM,
            ),
            clouds: Vec::new(),
        }
    }

    /// Add one muon. Muons without neutrons are kept as a cloud row but fill
    /// no histogram.
    pub fn record(
        &mut self,
        captures: &[Vec3],
        muon_entry: Vec3,
        muon_direction: Vec3,
        low_energy_triggers: u32,
    ) -> NeutronCloud {
        let cloud = NeutronCloud::from_captures(captures, muon_entry, muon_direction);
        if cloud.multiplicity > 0 {
            self.multiplicity.fill(cloud.multiplicity as f64);
            if let Some(distance) = cloud.distance_to_muon {
                self.distance.fill(f64::from(distance));
            }
            self.low_energy_triggers.fill(f64::from(low_energy_triggers));
        }
        debug!(
            multiplicity = cloud.multiplicity,
            distance = ?cloud.distance_to_muon,
            "neutron cloud recorded"
        );
        self.clouds.push(cloud);
        cloud
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| RecoError::Serialization(format!("neutron cloud summary: {err}")))
    }
}
