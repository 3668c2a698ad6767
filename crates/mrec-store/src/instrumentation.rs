//! Event-store observability counters.
//!
//! Process-local counters for the seeks, gated reloads and row appends issued
//! by write-out. Every cursor move is expensive, so these are the first thing
//! to look at when a run slows down.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of event-store counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreMetricsSnapshot {
    /// All cursor seeks issued through a guard.
    pub seeks_total: u64,
    /// Seeks that prefetched a following trigger window.
    pub lookahead_seeks_total: u64,
    /// Reloads of a sub-trigger through the timing gate.
    pub gated_reloads_total: u64,
    /// Seeks that put the cursor back where the caller left it.
    pub restore_seeks_total: u64,
    /// Rows appended to any output store.
    pub rows_appended_total: u64,
    /// Temporary masking-mode switches.
    pub masking_toggles_total: u64,
}

static SEEKS_TOTAL: AtomicU64 = AtomicU64::new(0);
static LOOKAHEAD_SEEKS_TOTAL: AtomicU64 = AtomicU64::new(0);
static GATED_RELOADS_TOTAL: AtomicU64 = AtomicU64::new(0);
static RESTORE_SEEKS_TOTAL: AtomicU64 = AtomicU64::new(0);
static ROWS_APPENDED_TOTAL: AtomicU64 = AtomicU64::new(0);
static MASKING_TOGGLES_TOTAL: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record_seek() {
    SEEKS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_lookahead_seek() {
    LOOKAHEAD_SEEKS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_gated_reload() {
    GATED_RELOADS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_restore_seek() {
    RESTORE_SEEKS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_masking_toggle() {
    MASKING_TOGGLES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Record one row appended to an output store.
pub fn record_row_appended() {
    ROWS_APPENDED_TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Return a snapshot of the event-store counters.
#[must_use]
pub fn store_metrics_snapshot() -> StoreMetricsSnapshot {
    StoreMetricsSnapshot {
        seeks_total: SEEKS_TOTAL.load(Ordering::Relaxed),
        lookahead_seeks_total: LOOKAHEAD_SEEKS_TOTAL.load(Ordering::Relaxed),
        gated_reloads_total: GATED_RELOADS_TOTAL.load(Ordering::Relaxed),
        restore_seeks_total: RESTORE_SEEKS_TOTAL.load(Ordering::Relaxed),
        rows_appended_total: ROWS_APPENDED_TOTAL.load(Ordering::Relaxed),
        masking_toggles_total: MASKING_TOGGLES_TOTAL.load(Ordering::Relaxed),
    }
}

/// Reset all event-store counters.
pub fn reset_store_metrics() {
    SEEKS_TOTAL.store(0, Ordering::Relaxed);
    LOOKAHEAD_SEEKS_TOTAL.store(0, Ordering::Relaxed);
    GATED_RELOADS_TOTAL.store(0, Ordering::Relaxed);
    RESTORE_SEEKS_TOTAL.store(0, Ordering::Relaxed);
    ROWS_APPENDED_TOTAL.store(0, Ordering::Relaxed);
    MASKING_TOGGLES_TOTAL.store(0, Ordering::Relaxed);
}
