//! Profiling pass
//!
//! Streams typed row batches into per-column running aggregates and detects
//! candidate keys. Profiles are finalized once and treated as immutable by
//! the downstream classification and modeling stages.

pub mod column;
pub mod keys;
pub mod profiler;
pub mod sketch;

/// Error during the profiling pass
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("malformed batch at row offset {offset}: no row matched the {expected}-column schema")]
    MalformedBatch { offset: u64, expected: usize },
    #[error("source has no columns")]
    EmptySchema,
}

pub use column::{ColumnProfile, InferredType, TopValue};
pub use keys::{KeyCandidate, KeyCandidateDetector};
pub use profiler::{ColumnProfiler, TableProfile};
