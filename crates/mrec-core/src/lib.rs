//! Matched-event write-out.
//!
//! Candidates flagged upstream are re-read out of stream order, optionally
//! merged with the following trigger window, reconstructed when they are
//! muons, and appended to their category's output store:
//!
//! - [`merge`]: overlap-aware merging of two hit windows;
//! - [`writeout`]: the per-call orchestrator over the shared cursor;
//! - [`tool`]: the initialise / execute / finalise cycle and store registry;
//! - [`neutron_cloud`]: neutron-cloud summary for written-out muons.

pub mod config;
pub mod merge;
pub mod neutron_cloud;
pub mod report;
pub mod tool;
pub mod writeout;

pub use config::WriteOutConfig;
pub use merge::{
    MergeOutcome, OverflowPolicy, SubsystemMerge, merge_subsystem, merge_windows,
    overlap_resume_point,
};
pub use neutron_cloud::{FixedHistogram, NeutronCloud, NeutronCloudSummary, closest_approach};
pub use report::{CycleReport, WriteOutReport};
pub use tool::{CandidateQueues, MatchedWriteOutTool, SharedVars, StoreRegistry};
pub use writeout::CandidateWriter;
