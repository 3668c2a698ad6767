//! Hit buffers for the inner and outer detector subsystems.

use mrec_error::{RecoError, Result};
use serde::{Deserialize, Serialize};

/// Default hit-buffer capacity of the inner detector readout.
pub const INNER_HIT_CAPACITY: usize = 30 * 11_146;
/// Default hit-buffer capacity of the outer detector readout.
pub const OUTER_HIT_CAPACITY: usize = 30 * 1_885;

/// Detector subsystem a hit buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Inner detector.
    Inner,
    /// Outer (veto) detector.
    Outer,
}

impl Subsystem {
    /// Stable label used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Outer => "outer",
        }
    }
}

/// A single digitised PMT hit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Hit {
    /// Cable / channel id.
    pub channel: i32,
    /// Charge in photo-electrons.
    pub charge: f32,
    /// Time relative to the owning trigger.
    pub time: f32,
}

impl Hit {
    #[must_use]
    pub const fn new(channel: i32, charge: f32, time: f32) -> Self {
        Self {
            channel,
            charge,
            time,
        }
    }

    /// Whether two hits look like the same pulse seen by two readouts.
    ///
    /// Times are relative to different trigger times and cannot be compared,
    /// so only channel and charge take part.
    #[must_use]
    pub fn same_pulse(&self, other: &Self) -> bool {
        self.channel == other.channel && self.charge == other.charge
    }
}

/// Bounded, ordered hit buffer for one subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HitArraysRepr")]
pub struct HitArrays {
    hits: Vec<Hit>,
    capacity: usize,
}

/// Wire form of [`HitArrays`]; checked against the capacity on the way in.
#[derive(Deserialize)]
struct HitArraysRepr {
    hits: Vec<Hit>,
    capacity: usize,
}

impl TryFrom<HitArraysRepr> for HitArrays {
    type Error = RecoError;

    fn try_from(repr: HitArraysRepr) -> Result<Self> {
        Self::from_hits(repr.hits, repr.capacity)
    }
}

impl HitArrays {
    /// Create an empty buffer that may hold at most `capacity` hits.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hits: Vec::new(),
            capacity,
        }
    }

    /// Build a buffer from existing hits.
    pub fn from_hits(hits: Vec<Hit>, capacity: usize) -> Result<Self> {
        if hits.len() > capacity {
            return Err(RecoError::out_of_range(
                "hit count",
                format!("{} > capacity {capacity}", hits.len()),
            ));
        }
        Ok(Self { hits, capacity })
    }

    /// Number of hits stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Maximum number of hits this buffer may hold.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots left before the capacity is reached.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.hits.len())
    }

    #[must_use]
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Most recently recorded hit.
    #[must_use]
    pub fn last(&self) -> Option<&Hit> {
        self.hits.last()
    }

    pub fn push(&mut self, hit: Hit) -> Result<()> {
        if self.remaining() == 0 {
            return Err(RecoError::out_of_range(
                "hit count",
                format!("{} + 1 > capacity {}", self.hits.len(), self.capacity),
            ));
        }
        self.hits.push(hit);
        Ok(())
    }

    /// Append every hit in `more`, failing without modification if they do not fit.
    pub fn extend_from_slice(&mut self, more: &[Hit]) -> Result<()> {
        if more.len() > self.remaining() {
            return Err(RecoError::out_of_range(
                "hit count",
                format!(
                    "{} + {} > capacity {}",
                    self.hits.len(),
                    more.len(),
                    self.capacity
                ),
            ));
        }
        self.hits.extend_from_slice(more);
        Ok(())
    }

    /// Keep only the hits for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&Hit) -> bool) {
        self.hits.retain(keep);
    }

    /// Apply `f` to every stored hit in place.
    pub fn for_each_mut(&mut self, f: impl FnMut(&mut Hit)) {
        self.hits.iter_mut().for_each(f);
    }

    /// Sum of the stored charges.
    #[must_use]
    pub fn total_charge(&self) -> f32 {
        self.hits.iter().map(|hit| hit.charge).sum()
    }
}

/// Hits of one trigger window for both subsystems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitWindow {
    pub inner: HitArrays,
    pub outer: HitArrays,
}

impl HitWindow {
    /// Empty window with the default readout capacities.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: HitArrays::with_capacity(INNER_HIT_CAPACITY),
            outer: HitArrays::with_capacity(OUTER_HIT_CAPACITY),
        }
    }

    /// Window built from hit lists with the default readout capacities.
    pub fn from_hits(inner: Vec<Hit>, outer: Vec<Hit>) -> Result<Self> {
        Ok(Self {
            inner: HitArrays::from_hits(inner, INNER_HIT_CAPACITY)?,
            outer: HitArrays::from_hits(outer, OUTER_HIT_CAPACITY)?,
        })
    }

    #[must_use]
    pub const fn subsystem(&self, subsystem: Subsystem) -> &HitArrays {
        match subsystem {
            Subsystem::Inner => &self.inner,
            Subsystem::Outer => &self.outer,
        }
    }

    pub fn subsystem_mut(&mut self, subsystem: Subsystem) -> &mut HitArrays {
        match subsystem {
            Subsystem::Inner => &mut self.inner,
            Subsystem::Outer => &mut self.outer,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty() && self.outer.is_empty()
    }
}

impl Default for HitWindow {
    fn default() -> Self {
        Self::empty()
    }
}
