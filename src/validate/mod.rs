//! Data quality validation
//!
//! Post-hoc checks over the written extracts. Validation reads the CSVs back
//! rather than trusting in-memory state, so it catches writer bugs as well as
//! data problems. Findings are reported, never fatal; only an unreadable
//! extract aborts.

pub mod dq;

use serde::{Deserialize, Serialize};

/// Error reading extracts during validation
#[derive(Debug, thiserror::Error)]
pub enum DqError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("extract for table {0} is missing")]
    MissingExtract(String),
}

/// What a single check looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DqCheckKind {
    PrimaryKeyUnique,
    ForeignKeyResolves,
    NotNull,
    TypeConforms,
}

/// Outcome of one check against one table (and usually one column).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DqCheck {
    pub kind: DqCheckKind,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub passed: bool,
    pub failure_count: u64,
    /// At most a handful of offending values, for the report.
    pub samples: Vec<String>,
}

/// The full validation report for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DqReport {
    pub checks: Vec<DqCheck>,
    pub overall_passed: bool,
}

impl DqReport {
    pub fn failures(&self) -> Vec<&DqCheck> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }
}

pub use dq::DqValidator;
