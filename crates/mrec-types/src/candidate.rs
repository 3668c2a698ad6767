//! Candidates queued upstream for out-of-order write-out.

use serde::{Deserialize, Serialize};

/// Output category of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Low-energy (relic) candidate.
    LowEnergy,
    /// Muon candidate.
    Muon,
}

impl EventCategory {
    /// Stable label used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowEnergy => "lowe",
            Self::Muon => "muon",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hardware clock of the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HwTimestamp {
    /// Clock ticks since the last rollover.
    pub clock_ticks: u64,
    /// Number of clock rollovers since run start.
    pub rollovers: u32,
}

/// A partner event matched to a candidate by the upstream selection.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchedPartner {
    pub event_number: u32,
    pub entry_number: u64,
    pub has_following_window: bool,
    /// Time difference to the candidate (ns).
    pub time_diff: f64,
    /// Reconstructed energy of the partner (MeV).
    pub energy: f32,
}

/// Low-energy reconstruction computed upstream; copied through verbatim.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LowEPayload {
    /// Vertex position and time.
    pub vertex: [f32; 4],
    pub direction: [f32; 3],
    pub goodness: [f32; 2],
    pub direction_ks: f32,
    pub energy: f32,
    pub n50: i32,
    pub cos_sun: f32,
    /// Auxiliary values the upstream fit stored alongside its result.
    pub info: Vec<f32>,
}

/// Category-specific part of a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CandidateKind {
    /// A low-energy candidate carrying its pre-computed reconstruction.
    LowEnergy(LowEPayload),
    /// A muon candidate; reconstruction happens at write-out.
    Muon,
}

/// A record queued for re-reading and write-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Entry number of the primary trigger in the event store.
    pub entry: u64,
    /// Sub-trigger index; 0 for the primary trigger.
    pub sub_trigger: u32,
    /// Timing-gate offset to re-apply for a sub-trigger.
    pub gate_offset: i32,
    /// Whether the following entry holds a trigger window to merge in.
    pub has_following_window: bool,
    pub kind: CandidateKind,
    /// Matched partners; empty when upstream found none.
    pub partners: Vec<MatchedPartner>,
    pub timestamp: HwTimestamp,
}

impl Candidate {
    /// Muon candidate at `entry` with no partners or sub-trigger.
    #[must_use]
    pub fn muon(entry: u64) -> Self {
        Self {
            entry,
            sub_trigger: 0,
            gate_offset: 0,
            has_following_window: false,
            kind: CandidateKind::Muon,
            partners: Vec::new(),
            timestamp: HwTimestamp::default(),
        }
    }

    /// Low-energy candidate at `entry` carrying `payload`.
    #[must_use]
    pub fn low_energy(entry: u64, payload: LowEPayload) -> Self {
        Self {
            kind: CandidateKind::LowEnergy(payload),
            ..Self::muon(entry)
        }
    }

    #[must_use]
    pub fn with_following_window(mut self) -> Self {
        self.has_following_window = true;
        self
    }

    #[must_use]
    pub fn with_sub_trigger(mut self, sub_trigger: u32, gate_offset: i32) -> Self {
        self.sub_trigger = sub_trigger;
        self.gate_offset = gate_offset;
        self
    }

    #[must_use]
    pub fn with_partner(mut self, partner: MatchedPartner) -> Self {
        self.partners.push(partner);
        self
    }

    #[must_use]
    pub const fn category(&self) -> EventCategory {
        match self.kind {
            CandidateKind::LowEnergy(_) => EventCategory::LowEnergy,
            CandidateKind::Muon => EventCategory::Muon,
        }
    }

    /// Entry holding the following trigger window, if any.
    #[must_use]
    pub fn following_entry(&self) -> Option<u64> {
        self.has_following_window
            .then_some(self.entry.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_follows_kind() {
        assert_eq!(Candidate::muon(4).category(), EventCategory::Muon);
        assert_eq!(
            Candidate::low_energy(4, LowEPayload::default()).category(),
            EventCategory::LowEnergy
        );
    }

    #[test]
    fn following_entry_only_when_flagged() {
        assert_eq!(Candidate::muon(9).following_entry(), None);
        assert_eq!(
            Candidate::muon(9).with_following_window().following_entry(),
            Some(10)
        );
    }

    #[test]
    fn partnerless_candidate_serializes_empty_matches() {
        let cand = Candidate::low_energy(2, LowEPayload::default());
        let json = serde_json::to_value(&cand).unwrap();
        assert_eq!(json["partners"], serde_json::json!([]));
    }
}
