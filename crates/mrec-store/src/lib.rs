//! Event-store access for matched-event write-out.
//!
//! The event store exposes a single cursor shared by every consumer of the
//! stream. [`CursorGuard`] and [`MaskingGuard`] wrap the two pieces of global
//! store state (cursor position and channel masking) so that whatever a
//! write-out does to them is undone on every exit path.

pub mod cursor;
pub mod instrumentation;
pub mod masking;
pub mod memory;
pub mod output;

pub use cursor::{CursorGuard, EventCursor, SeekPurpose};
pub use instrumentation::{StoreMetricsSnapshot, reset_store_metrics, store_metrics_snapshot};
pub use masking::{ChannelMasking, MaskingGuard, with_masking};
pub use memory::{LoadRecord, MemoryEventStore};
pub use output::{
    JsonlOutputStore, MatchColumns, MemoryOutputStore, OutputRow, OutputStore, RowPayload,
};
