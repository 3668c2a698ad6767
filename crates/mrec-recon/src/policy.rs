//! Thresholds steering the reconstruction cascade.

use mrec_error::{RecoError, Result};
use serde::{Deserialize, Serialize};

/// Named thresholds of the fallback cascade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconPolicy {
    /// Multi-track goodness below which the precision fit is tried.
    pub multi_track_goodness_ceiling: f32,
    /// Precision-fit goodness above which its result overrides the primary
    /// track for the energy-loss estimates.
    pub precision_goodness_floor: f32,
    /// Goodness below which any fit is considered poor.
    pub poor_goodness_floor: f32,
    /// Multi-track class of a single through-going track.
    pub single_through_going_class: i32,
}

impl ReconPolicy {
    pub const DEFAULT_MULTI_TRACK_GOODNESS_CEILING: f32 = 0.4;
    pub const DEFAULT_PRECISION_GOODNESS_FLOOR: f32 = 0.3;
    pub const DEFAULT_POOR_GOODNESS_FLOOR: f32 = 0.1;
    pub const DEFAULT_SINGLE_THROUGH_GOING_CLASS: i32 = 1;

    /// Whether the multi-track outcome warrants the precision fit.
    #[must_use]
    pub fn precision_fit_warranted(
        &self,
        permit: PrecisionPermit,
        track_class: i32,
        track_goodness: f32,
    ) -> bool {
        permit.allows()
            && track_class == self.single_through_going_class
            && track_goodness < self.multi_track_goodness_ceiling
    }

    /// Whether a precision fit is good enough to override the primary track.
    #[must_use]
    pub fn precision_fit_accepted(&self, precision_goodness: f32) -> bool {
        precision_goodness > self.precision_goodness_floor
    }

    #[must_use]
    pub fn is_poor(&self, goodness: f32) -> bool {
        goodness < self.poor_goodness_floor
    }

    /// Check that every threshold is a usable goodness value.
    pub fn validate(&self) -> Result<()> {
        let goodness = [
            ("multi_track_goodness_ceiling", self.multi_track_goodness_ceiling),
            ("precision_goodness_floor", self.precision_goodness_floor),
            ("poor_goodness_floor", self.poor_goodness_floor),
        ];
        for (name, value) in goodness {
            if !(0.0..=1.0).contains(&value) {
                return Err(RecoError::Config(format!(
                    "policy.{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ReconPolicy {
    fn default() -> Self {
        Self {
            multi_track_goodness_ceiling: Self::DEFAULT_MULTI_TRACK_GOODNESS_CEILING,
            precision_goodness_floor: Self::DEFAULT_PRECISION_GOODNESS_FLOOR,
            poor_goodness_floor: Self::DEFAULT_POOR_GOODNESS_FLOOR,
            single_through_going_class: Self::DEFAULT_SINGLE_THROUGH_GOING_CLASS,
        }
    }
}

/// The two switches that must both allow the precision fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrecisionPermit {
    /// Tool-wide switch; off when the precision fit is vetoed in configuration.
    pub enabled: bool,
    /// Per-record permission set by upstream selection.
    pub permitted: bool,
}

impl PrecisionPermit {
    #[must_use]
    pub const fn new(enabled: bool, permitted: bool) -> Self {
        Self { enabled, permitted }
    }

    #[must_use]
    pub const fn allows(self) -> bool {
        self.enabled && self.permitted
    }
}
