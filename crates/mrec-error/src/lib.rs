//! Error type shared by every crate in the write-out workspace.
//!
//! Read and gated-reload failures abort a whole write-out call, while errors
//! raised by the reconstruction pipeline only cost the candidate being
//! reconstructed. Missing match metadata and absent precision fits are plain
//! data and never surface here.

use std::fmt;

/// Primary error type for event-store access, reconstruction and write-out.
#[derive(Debug, thiserror::Error)]
pub enum RecoError {
    /// Seeking or reading an entry of the event store failed.
    #[error("failed to read entry {entry}: {detail}")]
    Read { entry: u64, detail: String },

    /// Re-reading a sub-trigger through the timing gate returned a
    /// non-physics status code.
    #[error("sub-trigger reload of entry {entry} returned status {status}")]
    SubTriggerReload { entry: u64, status: i32 },

    /// The fast selector signalled neither a good nor a bad fit.
    #[error("fast selector returned an unsupported zero quality")]
    UnsupportedSelectorState,

    /// Merging a following window would exceed a subsystem's hit capacity.
    #[error("{subsystem} hit capacity exceeded: needed {needed}, capacity {capacity}")]
    HitCapacityExceeded {
        subsystem: &'static str,
        needed: usize,
        capacity: usize,
    },

    /// A value fell outside its permitted range.
    #[error("{what} out of range: {value}")]
    OutOfRange { what: String, value: String },

    /// A named reader or writer is not registered.
    #[error("unknown store '{name}'")]
    UnknownStore { name: String },

    /// Configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Underlying file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A row or report could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Invariant violation inside this workspace.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RecoError {
    /// Build an [`RecoError::Internal`] from any displayable message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Build a [`RecoError::Read`] for `entry`.
    pub fn read(entry: u64, detail: impl fmt::Display) -> Self {
        Self::Read {
            entry,
            detail: detail.to_string(),
        }
    }

    /// Build an [`RecoError::OutOfRange`] from a label and the offending value.
    pub fn out_of_range(what: impl Into<String>, value: impl fmt::Display) -> Self {
        Self::OutOfRange {
            what: what.into(),
            value: value.to_string(),
        }
    }
}

/// Result alias used throughout the workspace.
pub type Result<T, E = RecoError> = std::result::Result<T, E>;
