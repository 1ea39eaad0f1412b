//! Candidate key detection and validation
//!
//! Candidates come from the finalized profiles (cheap), then get validated
//! with one dedicated streaming pass that tracks true uniqueness with a hash
//! set per candidate tuple. Composite search is bounded: only columns with
//! high individual distinctness seed combinations, and width is capped,
//! because exhaustive search is infeasible beyond small widths.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::batch::BatchSource;
use crate::config::PipelineConfig;
use crate::profile::column::{ColumnProfile, InferredType};

/// An ordered set of columns proposed as a key, with exact metrics from the
/// validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyCandidate {
    pub columns: Vec<String>,
    /// Distinct tuples / total rows, exact over the validated stream.
    pub uniqueness: f64,
    /// Rows where any tuple component was null / total rows.
    pub null_ratio: f64,
    pub distinct_count: u64,
}

static KEY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(_id$|^id$|guid)").expect("valid regex"));

impl KeyCandidate {
    /// Clean means usable as a natural key: fully unique, never null.
    pub fn is_clean(&self) -> bool {
        self.uniqueness == 1.0 && self.null_ratio == 0.0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// True when every column looks like an identifier by name. Used to
    /// prefer `order_id` over an incidentally-unique measure column.
    pub fn is_key_named(&self) -> bool {
        self.columns.iter().all(|c| KEY_NAME.is_match(c))
    }
}

/// Detects and validates candidate keys.
pub struct KeyCandidateDetector;

impl KeyCandidateDetector {
    /// Propose candidates from profiles: single columns whose distinct count
    /// approaches the row count, plus bounded-width combinations of columns
    /// with high individual distinctness.
    pub fn generate(profiles: &[ColumnProfile], config: &PipelineConfig) -> Vec<Vec<String>> {
        let mut proposals: Vec<Vec<String>> = Vec::new();

        for profile in profiles {
            if profile.inferred_type == InferredType::List {
                continue;
            }
            if profile.distinct_ratio() >= config.key_uniqueness_threshold {
                proposals.push(vec![profile.name.clone()]);
            }
        }

        let seeds: Vec<&ColumnProfile> = profiles
            .iter()
            .filter(|p| {
                p.inferred_type != InferredType::List
                    && p.distinct_ratio() >= config.composite_seed_ratio
            })
            .collect();

        let width = config.effective_composite_width();
        if width >= 2 {
            for i in 0..seeds.len() {
                for j in (i + 1)..seeds.len() {
                    proposals.push(vec![seeds[i].name.clone(), seeds[j].name.clone()]);
                    if width >= 3 {
                        for k in (j + 1)..seeds.len() {
                            proposals.push(vec![
                                seeds[i].name.clone(),
                                seeds[j].name.clone(),
                                seeds[k].name.clone(),
                            ]);
                        }
                    }
                }
            }
        }

        tracing::debug!(count = proposals.len(), "generated key candidates");
        proposals
    }

    /// Validate proposals with one streaming pass.
    ///
    /// Each candidate owns a set of tuple digests; a single thread owns all
    /// sets for the duration of the pass, so there is one logical writer per
    /// key space. Malformed rows are skipped, mirroring the profiling pass.
    pub fn validate<S: BatchSource>(
        source: &S,
        proposals: &[Vec<String>],
    ) -> Vec<KeyCandidate> {
        let columns = source.columns();
        let indices: Vec<Option<Vec<usize>>> = proposals
            .iter()
            .map(|cols| {
                cols.iter()
                    .map(|c| columns.iter().position(|n| n == c))
                    .collect()
            })
            .collect();

        let mut seen: Vec<HashSet<[u8; 16]>> = proposals.iter().map(|_| HashSet::new()).collect();
        let mut null_rows: Vec<u64> = vec![0; proposals.len()];
        let mut total_rows = 0u64;

        for batch in source.scan() {
            for row in &batch.rows {
                if row.len() != columns.len() {
                    continue;
                }
                total_rows += 1;
                for (slot, idx) in indices.iter().enumerate() {
                    let Some(idx) = idx else { continue };
                    let mut any_null = false;
                    let mut hasher = Sha256::new();
                    for &i in idx {
                        let value = &row[i];
                        if value.is_null() {
                            any_null = true;
                        }
                        hasher.update(value.render().as_bytes());
                        hasher.update([0x1f]);
                    }
                    if any_null {
                        null_rows[slot] += 1;
                    }
                    let digest = hasher.finalize();
                    seen[slot].insert(digest[..16].try_into().expect("digest is 32 bytes"));
                }
            }
        }

        let mut candidates: Vec<KeyCandidate> = proposals
            .iter()
            .zip(indices.iter())
            .enumerate()
            .filter_map(|(slot, (cols, idx))| {
                idx.as_ref()?;
                let distinct = seen[slot].len() as u64;
                let uniqueness = if total_rows == 0 {
                    0.0
                } else {
                    distinct as f64 / total_rows as f64
                };
                Some(KeyCandidate {
                    columns: cols.clone(),
                    uniqueness,
                    null_ratio: if total_rows == 0 {
                        0.0
                    } else {
                        null_rows[slot] as f64 / total_rows as f64
                    },
                    distinct_count: distinct,
                })
            })
            .collect();

        // Preference order: clean before dirty, narrower before wider,
        // id-named before incidentally unique, lower null history, then name
        // for stability.
        candidates.sort_by(|a, b| {
            b.is_clean()
                .cmp(&a.is_clean())
                .then(a.width().cmp(&b.width()))
                .then(b.is_key_named().cmp(&a.is_key_named()))
                .then(
                    a.null_ratio
                        .partial_cmp(&b.null_ratio)
                        .expect("ratios are finite"),
                )
                .then_with(|| a.columns.cmp(&b.columns))
        });
        candidates
    }

    /// The minimal clean candidate, if any validated.
    pub fn best(candidates: &[KeyCandidate]) -> Option<&KeyCandidate> {
        candidates.iter().find(|c| c.is_clean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{MemorySource, Value};
    use crate::profile::profiler::ColumnProfiler;

    fn orders() -> MemorySource {
        let rows = vec![
            vec![
                Value::Integer(1),
                Value::Integer(101),
                Value::Text("a".into()),
            ],
            vec![
                Value::Integer(2),
                Value::Integer(101),
                Value::Text("b".into()),
            ],
            vec![
                Value::Integer(3),
                Value::Integer(102),
                Value::Text("a".into()),
            ],
        ];
        MemorySource::new(
            "orders.csv",
            vec![
                "order_id".to_string(),
                "customer_id".to_string(),
                "status".to_string(),
            ],
            rows,
            2,
        )
    }

    #[test]
    fn unique_column_becomes_clean_single_candidate() {
        let source = orders();
        let config = PipelineConfig::default();
        let (profiles, _) = ColumnProfiler::profile_source(&source, &config).unwrap();
        let proposals = KeyCandidateDetector::generate(&profiles, &config);
        let candidates = KeyCandidateDetector::validate(&source, &proposals);
        let best = KeyCandidateDetector::best(&candidates).unwrap();
        assert_eq!(best.columns, vec!["order_id".to_string()]);
        assert!(best.is_clean());
    }

    #[test]
    fn single_preferred_over_equally_clean_composite() {
        let source = orders();
        let proposals = vec![
            vec!["customer_id".to_string(), "status".to_string()],
            vec!["order_id".to_string()],
        ];
        let candidates = KeyCandidateDetector::validate(&source, &proposals);
        assert_eq!(candidates[0].columns, vec!["order_id".to_string()]);
    }

    #[test]
    fn nulls_disqualify_cleanliness() {
        let rows = vec![
            vec![Value::Integer(1)],
            vec![Value::Null],
            vec![Value::Integer(3)],
        ];
        let source = MemorySource::new("t.csv", vec!["id".to_string()], rows, 10);
        let candidates =
            KeyCandidateDetector::validate(&source, &[vec!["id".to_string()]]);
        assert!(!candidates[0].is_clean());
        assert!(candidates[0].null_ratio > 0.0);
    }

    #[test]
    fn no_clean_candidate_yields_none() {
        let rows = vec![
            vec![Value::Text("x".into())],
            vec![Value::Text("x".into())],
        ];
        let source = MemorySource::new("t.csv", vec!["v".to_string()], rows, 10);
        let candidates = KeyCandidateDetector::validate(&source, &[vec!["v".to_string()]]);
        assert!(KeyCandidateDetector::best(&candidates).is_none());
    }
}
