//! The record currently loaded from the event store.

use serde::{Deserialize, Serialize};

use crate::hits::HitWindow;

/// Header information of a readout record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventHeader {
    pub run: u32,
    pub subrun: u32,
    pub event_number: u32,
    /// Timing-gate offset (clock counts) the record was read with; 0 for
    /// the primary trigger.
    pub gate_offset: i32,
}

/// Total and maximum inner-detector charge of a record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChargeSummary {
    /// Total charge (p.e.).
    pub total: f32,
    /// Largest single-channel charge (p.e.).
    pub max: f32,
}

/// One fully loaded readout record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventRecord {
    pub header: EventHeader,
    pub charge: ChargeSummary,
    pub hits: HitWindow,
}

/// Channel-quality masking mode of the store.
///
/// Codes are opaque to this workspace apart from the two named constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaskingMode(i32);

impl MaskingMode {
    /// Mask every known-bad channel. Required for muon reconstruction.
    pub const MASK_ALL_BAD: Self = Self(0);
    /// No channel masking.
    pub const UNMASKED: Self = Self(-1);

    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Whether loads in this mode drop hits on known-bad channels.
    #[must_use]
    pub const fn masks_bad_channels(self) -> bool {
        self.0 == Self::MASK_ALL_BAD.0
    }
}

impl Default for MaskingMode {
    fn default() -> Self {
        Self::UNMASKED
    }
}

/// Status of a low-level gated read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadStatus {
    /// A physics entry was read.
    Physics,
    /// The read failed.
    Error,
    /// The end of the store was reached.
    EndOfFile,
    /// A non-physics entry (pedestal, run header, ...) with its raw code.
    NonPhysics(i32),
}

impl ReadStatus {
    /// Decode the raw status code returned by the reader.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Physics,
            1 => Self::Error,
            2 => Self::EndOfFile,
            other => Self::NonPhysics(other),
        }
    }

    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Physics => 0,
            Self::Error => 1,
            Self::EndOfFile => 2,
            Self::NonPhysics(code) => code,
        }
    }

    #[must_use]
    pub const fn is_physics(self) -> bool {
        matches!(self, Self::Physics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_status_codes_round_trip() {
        for code in [0, 1, 2, 3, -7] {
            assert_eq!(ReadStatus::from_code(code).code(), code);
        }
        assert!(ReadStatus::from_code(0).is_physics());
        assert_eq!(ReadStatus::from_code(5), ReadStatus::NonPhysics(5));
    }

    #[test]
    fn only_mask_all_masks_bad_channels() {
        assert!(MaskingMode::MASK_ALL_BAD.masks_bad_channels());
        assert!(!MaskingMode::UNMASKED.masks_bad_channels());
        assert!(!MaskingMode::from_code(23).masks_bad_channels());
        assert_eq!(MaskingMode::default(), MaskingMode::UNMASKED);
    }
}
