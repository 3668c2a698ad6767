//! Channel-quality masking control and its scoped override.

use std::ops::{Deref, DerefMut};

use mrec_types::MaskingMode;
use tracing::debug;

use crate::cursor::{CursorGuard, EventCursor};
use crate::instrumentation;

/// Global channel-masking mode applied when records are loaded.
pub trait ChannelMasking {
    fn masking_mode(&self) -> MaskingMode;

    fn set_masking_mode(&mut self, mode: MaskingMode);
}

impl<C> ChannelMasking for CursorGuard<'_, C>
where
    C: EventCursor + ChannelMasking,
{
    fn masking_mode(&self) -> MaskingMode {
        self.cursor_ref().masking_mode()
    }

    fn set_masking_mode(&mut self, mode: MaskingMode) {
        let from = self.cursor_ref().masking_mode();
        self.note_masking_change(from, mode);
        self.cursor_mut().set_masking_mode(mode);
    }
}

/// Switches the masking mode for its lifetime and restores the prior mode
/// when dropped, including on early returns.
pub struct MaskingGuard<'a, M: ChannelMasking> {
    target: &'a mut M,
    prior: MaskingMode,
}

impl<'a, M: ChannelMasking> MaskingGuard<'a, M> {
    pub fn new(target: &'a mut M, mode: MaskingMode) -> Self {
        let prior = target.masking_mode();
        if prior != mode {
            instrumentation::record_masking_toggle();
        }
        debug!(
            prior = prior.code(),
            mode = mode.code(),
            "overriding channel masking"
        );
        target.set_masking_mode(mode);
        Self { target, prior }
    }

    /// Mode that will be put back on drop.
    #[must_use]
    pub const fn prior_mode(&self) -> MaskingMode {
        self.prior
    }
}

impl<M: ChannelMasking> Deref for MaskingGuard<'_, M> {
    type Target = M;

    fn deref(&self) -> &M {
        self.target
    }
}

impl<M: ChannelMasking> DerefMut for MaskingGuard<'_, M> {
    fn deref_mut(&mut self) -> &mut M {
        self.target
    }
}

impl<M: ChannelMasking> Drop for MaskingGuard<'_, M> {
    fn drop(&mut self) {
        debug!(mode = self.prior.code(), "restoring channel masking");
        self.target.set_masking_mode(self.prior);
    }
}

/// Run `f` with `target` switched to `mode`, restoring the prior mode after.
pub fn with_masking<M, R>(target: &mut M, mode: MaskingMode, f: impl FnOnce(&mut M) -> R) -> R
where
    M: ChannelMasking,
{
    let mut guard = MaskingGuard::new(target, mode);
    f(&mut *guard)
}
