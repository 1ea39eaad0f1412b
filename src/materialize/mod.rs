//! Materialization pass
//!
//! Second streaming pass over the source: assigns deterministic surrogate
//! keys, splits each row across the generated tables, and writes one CSV
//! extract per table. Facts keep every source row; dimensions are globally
//! deduplicated on their natural key.

pub mod splitter;
pub mod surrogate;

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Error during materialization
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("surrogate key collision in {table}: {source}")]
    KeyCollision {
        table: String,
        source: surrogate::KeyCollision,
    },
    #[error("fact row references unknown {table} key {key}")]
    ReferentialGap { table: String, key: String },
    #[error("model references source column {0} that the source does not provide")]
    UnknownColumn(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// What the split produced: one extract per table, with row counts.
#[derive(Debug)]
pub struct SplitResult {
    /// Table name to extract path.
    pub files: BTreeMap<String, PathBuf>,
    /// Table name to rows written (excluding headers).
    pub row_counts: BTreeMap<String, u64>,
    /// Malformed source rows skipped during the pass.
    pub skipped_rows: u64,
    /// Load timestamp stamped on every row of this run.
    pub load_ts: chrono::NaiveDateTime,
}

pub use splitter::Splitter;
pub use surrogate::{SurrogateKeyMap, normalize_part, row_hash, surrogate_of};
