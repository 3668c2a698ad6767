//! Merging a following trigger window into a primary one.
//!
//! Two adjacent trigger windows can overlap in content. Trigger times differ,
//! so hit times cannot be used to find the overlap; instead the following
//! window is scanned for the first hit with the same channel and charge as the
//! primary window's last hit. Everything up to and including that hit is
//! taken to be already present and the rest is appended. With no match, the
//! whole following window is appended.
//!
//! A genuinely distinct pulse that happens to repeat the last primary hit's
//! channel and charge is indistinguishable from overlap and is dropped along
//! with everything before it.

use mrec_error::{RecoError, Result};
use mrec_types::{HitArrays, HitWindow, Subsystem};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What to do when appended hits would exceed a subsystem's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Append what fits, drop the tail and log a warning.
    #[default]
    Truncate,
    /// Fail with [`RecoError::HitCapacityExceeded`].
    Reject,
}

/// Outcome of merging one subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubsystemMerge {
    /// Hits appended to the primary.
    pub appended: usize,
    /// Leading following-window hits treated as overlap.
    pub overlap_skipped: usize,
    /// Hits dropped for lack of capacity.
    pub truncated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub inner: SubsystemMerge,
    pub outer: SubsystemMerge,
}

impl MergeOutcome {
    #[must_use]
    pub const fn subsystem(&self, subsystem: Subsystem) -> &SubsystemMerge {
        match subsystem {
            Subsystem::Inner => &self.inner,
            Subsystem::Outer => &self.outer,
        }
    }

    #[must_use]
    pub const fn appended(&self) -> usize {
        self.inner.appended + self.outer.appended
    }

    #[must_use]
    pub const fn overlap_skipped(&self) -> usize {
        self.inner.overlap_skipped + self.outer.overlap_skipped
    }

    #[must_use]
    pub const fn truncated(&self) -> usize {
        self.inner.truncated + self.outer.truncated
    }
}

/// Index of the first following-window hit to append.
///
/// One past the first hit matching the primary's last hit on channel and
/// charge, or 0 when nothing matches or the primary is empty.
#[must_use]
pub fn overlap_resume_point(primary: &HitArrays, following: &HitArrays) -> usize {
    let Some(last) = primary.last() else {
        return 0;
    };
    following
        .hits()
        .iter()
        .position(|hit| hit.same_pulse(last))
        .map_or(0, |k| k + 1)
}

/// Merge one subsystem's following hits into `primary`.
///
/// # Errors
///
/// Returns [`RecoError::HitCapacityExceeded`] under
/// [`OverflowPolicy::Reject`] when the hits do not fit; `primary` is left
/// untouched in that case.
pub fn merge_subsystem(
    subsystem: Subsystem,
    primary: &mut HitArrays,
    following: &HitArrays,
    policy: OverflowPolicy,
) -> Result<SubsystemMerge> {
    let resume = overlap_resume_point(primary, following);
    let pending = following.hits().get(resume..).unwrap_or_default();
    let room = primary.remaining();

    let mut take = pending.len();
    if take > room {
        match policy {
            OverflowPolicy::Reject => {
                return Err(RecoError::HitCapacityExceeded {
                    subsystem: subsystem.as_str(),
                    needed: primary.len() + pending.len(),
                    capacity: primary.capacity(),
                });
            }
            OverflowPolicy::Truncate => {
                warn!(
                    subsystem = subsystem.as_str(),
                    pending = pending.len(),
                    room,
                    "following window exceeds hit capacity, truncating"
                );
                take = room;
            }
        }
    }

    let (appended, dropped) = pending.split_at(take);
    primary.extend_from_slice(appended)?;
    Ok(SubsystemMerge {
        appended: appended.len(),
        overlap_skipped: resume,
        truncated: dropped.len(),
    })
}

/// Merge `following` into `primary`, each subsystem independently.
///
/// Primary hits keep their order and appended hits follow in their original
/// order. Merging is not commutative.
///
/// # Errors
///
/// See [`merge_subsystem`].
pub fn merge_windows(
    primary: &mut HitWindow,
    following: &HitWindow,
    policy: OverflowPolicy,
) -> Result<MergeOutcome> {
    let inner = merge_subsystem(Subsystem::Inner, &mut primary.inner, &following.inner, policy)?;
    let outer = merge_subsystem(Subsystem::Outer, &mut primary.outer, &following.outer, policy)?;
    debug!(
        inner_appended = inner.appended,
        outer_appended = outer.appended,
        inner_overlap = inner.overlap_skipped,
        outer_overlap = outer.overlap_skipped,
        "merged following window"
    );
    Ok(MergeOutcome { inner, outer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrec_types::Hit;
    use proptest::prelude::*;

    fn arrays(hits: &[(i32, f32)], capacity: usize) -> HitArrays {
        let hits = hits
            .iter()
            .enumerate()
            .map(|(i, &(channel, charge))| Hit::new(channel, charge, i as f32))
            .collect();
        HitArrays::from_hits(hits, capacity).unwrap()
    }

    fn channels(arrays: &HitArrays) -> Vec<i32> {
        arrays.hits().iter().map(|hit| hit.channel).collect()
    }

    #[test]
    fn no_match_appends_everything() {
        let mut primary = arrays(&[(1, 1.0), (2, 2.0)], 16);
        let following = arrays(&[(3, 3.0), (4, 4.0)], 16);
        let outcome =
            merge_subsystem(Subsystem::Inner, &mut primary, &following, OverflowPolicy::Truncate)
                .unwrap();
        assert_eq!(channels(&primary), vec![1, 2, 3, 4]);
        assert_eq!(outcome.appended, 2);
        assert_eq!(outcome.overlap_skipped, 0);
    }

    #[test]
    fn match_resumes_after_matching_hit() {
        let mut primary = arrays(&[(1, 1.0), (2, 2.0), (7, 0.5)], 16);
        let following = arrays(&[(5, 1.0), (7, 0.5), (8, 1.0), (9, 1.0)], 16);
        let outcome =
            merge_subsystem(Subsystem::Inner, &mut primary, &following, OverflowPolicy::Truncate)
                .unwrap();
        assert_eq!(channels(&primary), vec![1, 2, 7, 8, 9]);
        assert_eq!(outcome.overlap_skipped, 2);
        assert_eq!(outcome.appended, 2);
    }

    #[test]
    fn match_on_first_following_hit_drops_only_it() {
        let mut primary = arrays(&[(1, 1.0), (2, 2.0)], 16);
        let following = arrays(&[(2, 2.0), (3, 3.0)], 16);
        merge_subsystem(Subsystem::Inner, &mut primary, &following, OverflowPolicy::Truncate)
            .unwrap();
        assert_eq!(channels(&primary), vec![1, 2, 3]);
    }

    #[test]
    fn match_ignores_time() {
        let mut primary = HitArrays::from_hits(vec![Hit::new(4, 2.5, 900.0)], 8).unwrap();
        let following = HitArrays::from_hits(
            vec![Hit::new(4, 2.5, -100.0), Hit::new(6, 1.0, -90.0)],
            8,
        )
        .unwrap();
        merge_subsystem(Subsystem::Outer, &mut primary, &following, OverflowPolicy::Truncate)
            .unwrap();
        assert_eq!(channels(&primary), vec![4, 6]);
    }

    #[test]
    fn coincident_channel_and_charge_is_treated_as_overlap() {
        // The following window's third hit is a distinct pulse on the same
        // channel with the same charge as the primary's last hit. It cannot be
        // told apart from real overlap, so it and the two hits before it are
        // dropped.
        let mut primary = arrays(&[(10, 1.0), (11, 4.0)], 16);
        let following = arrays(&[(20, 1.0), (21, 1.0), (11, 4.0), (22, 1.0)], 16);
        let outcome =
            merge_subsystem(Subsystem::Inner, &mut primary, &following, OverflowPolicy::Truncate)
                .unwrap();
        assert_eq!(channels(&primary), vec![10, 11, 22]);
        assert_eq!(outcome.overlap_skipped, 3);
    }

    #[test]
    fn empty_primary_appends_everything() {
        let mut primary = arrays(&[], 16);
        let following = arrays(&[(1, 1.0), (2, 2.0)], 16);
        merge_subsystem(Subsystem::Inner, &mut primary, &following, OverflowPolicy::Truncate)
            .unwrap();
        assert_eq!(channels(&primary), vec![1, 2]);
    }

    #[test]
    fn merge_is_not_commutative() {
        let a = arrays(&[(1, 1.0), (2, 2.0)], 16);
        let b = arrays(&[(2, 2.0), (3, 3.0)], 16);

        let mut ab = a.clone();
        merge_subsystem(Subsystem::Inner, &mut ab, &b, OverflowPolicy::Truncate).unwrap();
        let mut ba = b.clone();
        merge_subsystem(Subsystem::Inner, &mut ba, &a, OverflowPolicy::Truncate).unwrap();

        assert_eq!(channels(&ab), vec![1, 2, 3]);
        assert_eq!(channels(&ba), vec![2, 3, 1, 2]);
        assert_ne!(channels(&ab), channels(&ba));
    }

    #[test]
    fn truncate_fills_to_capacity() {
        let mut primary = arrays(&[(1, 1.0), (2, 1.0)], 4);
        let following = arrays(&[(3, 1.0), (4, 1.0), (5, 1.0)], 8);
        let outcome =
            merge_subsystem(Subsystem::Inner, &mut primary, &following, OverflowPolicy::Truncate)
                .unwrap();
        assert_eq!(channels(&primary), vec![1, 2, 3, 4]);
        assert_eq!(outcome.appended, 2);
        assert_eq!(outcome.truncated, 1);
    }

    #[test]
    fn reject_leaves_primary_untouched() {
        let mut primary = arrays(&[(1, 1.0), (2, 1.0)], 3);
        let following = arrays(&[(3, 1.0), (4, 1.0)], 8);
        let err =
            merge_subsystem(Subsystem::Outer, &mut primary, &following, OverflowPolicy::Reject)
                .unwrap_err();
        assert!(matches!(
            err,
            RecoError::HitCapacityExceeded {
                subsystem: "outer",
                needed: 4,
                capacity: 3
            }
        ));
        assert_eq!(channels(&primary), vec![1, 2]);
    }

    #[test]
    fn subsystems_merge_independently() {
        let mut primary = HitWindow {
            inner: arrays(&[(1, 1.0)], 8),
            outer: arrays(&[(50, 5.0)], 8),
        };
        let following = HitWindow {
            inner: arrays(&[(50, 5.0), (2, 1.0)], 8),
            outer: arrays(&[(50, 5.0), (51, 1.0)], 8),
        };
        let outcome = merge_windows(&mut primary, &following, OverflowPolicy::Truncate).unwrap();
        assert_eq!(channels(&primary.inner), vec![1, 50, 2]);
        assert_eq!(channels(&primary.outer), vec![50, 51]);
        assert_eq!(outcome.subsystem(Subsystem::Outer).overlap_skipped, 1);
        assert_eq!(outcome.appended(), 3);
    }

    fn hit_list() -> impl Strategy<Value = Vec<(i32, f32)>> {
        prop::collection::vec((0_i32..64, (0_u8..8).prop_map(f32::from)), 0..24)
    }

    proptest! {
        #[test]
        fn prop_empty_following_is_noop(primary in hit_list()) {
            let mut merged = HitWindow {
                inner: arrays(&primary, 64),
                outer: arrays(&primary, 64),
            };
            let before = merged.clone();
            let outcome =
                merge_windows(&mut merged, &HitWindow::empty(), OverflowPolicy::Reject).unwrap();
            prop_assert_eq!(merged, before);
            prop_assert_eq!(outcome, MergeOutcome::default());
        }

        #[test]
        fn prop_disjoint_windows_concatenate(
            primary in prop::collection::vec((0_i32..32, 0.5_f32..4.0), 0..24),
            following in prop::collection::vec((32_i32..64, 0.5_f32..4.0), 0..24),
        ) {
            let mut merged = arrays(&primary, 64);
            let tail = arrays(&following, 64);
            merge_subsystem(Subsystem::Inner, &mut merged, &tail, OverflowPolicy::Reject).unwrap();
            prop_assert_eq!(merged.len(), primary.len() + following.len());
            let expected = arrays(&primary, 64);
            prop_assert_eq!(&merged.hits()[..primary.len()], expected.hits());
        }

        #[test]
        fn prop_count_accounts_for_every_following_hit(
            primary in hit_list(),
            following in hit_list(),
        ) {
            let mut merged = arrays(&primary, 64);
            let tail = arrays(&following, 64);
            let outcome =
                merge_subsystem(Subsystem::Inner, &mut merged, &tail, OverflowPolicy::Truncate)
                    .unwrap();
            prop_assert_eq!(
                outcome.appended + outcome.overlap_skipped + outcome.truncated,
                following.len()
            );
            prop_assert_eq!(merged.len(), primary.len() + outcome.appended);
        }
    }
}
