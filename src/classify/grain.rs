//! Grain detection
//!
//! Picks the fact grain from validated key candidates. When no candidate is
//! fully unique and non-null the grain falls back to the row hash, which keeps
//! duplicate source rows addressable without inventing uniqueness.

use serde::{Deserialize, Serialize};

use crate::profile::keys::{KeyCandidate, KeyCandidateDetector};

/// The declared grain of the central table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grain {
    /// Columns that pin the grain; empty when synthetic.
    pub key_columns: Vec<String>,
    /// True when no clean candidate existed and the row hash is the grain.
    pub synthetic: bool,
    /// Human-readable statement of what one row means.
    pub description: String,
    /// Why this grain was chosen, carried into the model summary.
    pub reason: String,
}

pub struct GrainDetector;

impl GrainDetector {
    /// Choose the grain from the sorted candidate list.
    pub fn detect(candidates: &[KeyCandidate]) -> Grain {
        match KeyCandidateDetector::best(candidates) {
            Some(best) => Grain {
                key_columns: best.columns.clone(),
                synthetic: false,
                description: format!("one row per ({})", best.columns.join(", ")),
                reason: format!(
                    "candidate ({}) validated fully unique with no nulls over {} rows",
                    best.columns.join(", "),
                    best.distinct_count
                ),
            },
            None => {
                tracing::warn!("no clean key candidate; using synthetic row-hash grain");
                Grain {
                    key_columns: Vec::new(),
                    synthetic: true,
                    description: "one row per source row (row hash)".to_string(),
                    reason: "no candidate key was fully unique and non-null; \
                             the row content hash identifies each row"
                        .to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_candidate_becomes_grain() {
        let candidates = vec![KeyCandidate {
            columns: vec!["order_id".to_string()],
            uniqueness: 1.0,
            null_ratio: 0.0,
            distinct_count: 10,
        }];
        let grain = GrainDetector::detect(&candidates);
        assert!(!grain.synthetic);
        assert_eq!(grain.key_columns, vec!["order_id".to_string()]);
    }

    #[test]
    fn dirty_candidates_fall_back_to_row_hash() {
        let candidates = vec![KeyCandidate {
            columns: vec!["status".to_string()],
            uniqueness: 0.4,
            null_ratio: 0.0,
            distinct_count: 4,
        }];
        let grain = GrainDetector::detect(&candidates);
        assert!(grain.synthetic);
        assert!(grain.key_columns.is_empty());
    }
}
