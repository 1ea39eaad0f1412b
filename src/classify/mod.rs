//! Classification pass
//!
//! Assigns a role to every profiled column and a fact/dimension role to the
//! table, entirely from finalized profiles. Rules are named and ordered so two
//! runs over the same profiles always classify identically; low-margin
//! decisions are flagged for review rather than silently committed.

pub mod grain;
pub mod rules;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::profile::column::ColumnProfile;
use crate::profile::keys::{KeyCandidate, KeyCandidateDetector};

pub use grain::{Grain, GrainDetector};
pub use rules::{ColumnRole, Rule, RuleContext, Vote, RULES};

/// A vote as recorded in the classification output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub rule: String,
    pub role: ColumnRole,
    pub confidence: f64,
}

/// Final role for one column, with the full vote trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnClassification {
    pub name: String,
    pub role: ColumnRole,
    /// Rule that won the vote.
    pub decided_by: String,
    pub confidence: f64,
    pub votes: Vec<VoteRecord>,
}

/// Whether the table as a whole reads as a fact or a dimension source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableRole {
    Fact,
    Dimension,
}

/// Output of the classification pass for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableClassification {
    pub columns: Vec<ColumnClassification>,
    pub role: TableRole,
    /// Non-fatal concerns a reviewer should look at.
    pub review_flags: Vec<String>,
}

impl TableClassification {
    pub fn role_of(&self, column: &str) -> Option<ColumnRole> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.role)
    }

    pub fn columns_with_role(&self, role: ColumnRole) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.name.as_str())
            .collect()
    }
}

pub struct EntityClassifier;

impl EntityClassifier {
    /// Classify one column by running the full rule list and taking the
    /// highest-confidence vote; ties go to the earlier rule.
    pub fn classify_column(
        profile: &ColumnProfile,
        config: &PipelineConfig,
    ) -> ColumnClassification {
        let ctx = RuleContext { profile, config };
        let mut votes: Vec<VoteRecord> = Vec::new();
        let mut winner: Option<(usize, Vote)> = None;

        for (order, rule) in RULES.iter().enumerate() {
            let Some(vote) = (rule.predicate)(&ctx) else {
                continue;
            };
            votes.push(VoteRecord {
                rule: rule.name.to_string(),
                role: vote.role,
                confidence: vote.confidence,
            });
            let beats = match winner {
                None => true,
                Some((_, current)) => vote.confidence > current.confidence,
            };
            if beats {
                winner = Some((order, vote));
            }
        }

        // The fallback rule always votes, so a winner always exists.
        let (order, vote) = winner.expect("fallback rule votes unconditionally");
        ColumnClassification {
            name: profile.name.clone(),
            role: vote.role,
            decided_by: RULES[order].name.to_string(),
            confidence: vote.confidence,
            votes,
        }
    }

    /// Classify every column and derive the table role.
    ///
    /// A table with at least one measure is a fact source; otherwise it is a
    /// dimension source. Ambiguity never aborts the run, it only flags.
    pub fn classify(
        profiles: &[ColumnProfile],
        candidates: &[KeyCandidate],
        config: &PipelineConfig,
    ) -> TableClassification {
        let columns: Vec<ColumnClassification> = profiles
            .iter()
            .map(|p| Self::classify_column(p, config))
            .collect();

        let measures: Vec<&ColumnClassification> = columns
            .iter()
            .filter(|c| c.role == ColumnRole::Measure)
            .collect();
        let has_clean_key = KeyCandidateDetector::best(candidates).is_some();

        let role = if measures.is_empty() {
            TableRole::Dimension
        } else {
            TableRole::Fact
        };

        let mut review_flags = Vec::new();
        for col in &columns {
            if col.confidence < 0.65 && col.decided_by != "attribute_fallback" {
                review_flags.push(format!(
                    "column {} classified as {:?} by {} with low confidence {:.2}",
                    col.name, col.role, col.decided_by, col.confidence
                ));
            }
            let conflicting = col
                .votes
                .iter()
                .any(|v| v.role != col.role && v.confidence >= col.confidence - 0.1);
            if conflicting {
                review_flags.push(format!(
                    "column {} had competing votes within 0.1 of the winner",
                    col.name
                ));
            }
        }
        if role == TableRole::Fact && !has_clean_key {
            review_flags.push(
                "table has measures but no clean candidate key; fact grain is synthetic"
                    .to_string(),
            );
        }
        if role == TableRole::Dimension && !has_clean_key {
            review_flags.push(
                "table has no measures and no clean candidate key; dimension role is a best guess"
                    .to_string(),
            );
        }

        tracing::info!(
            role = ?role,
            measures = measures.len(),
            flags = review_flags.len(),
            "classification pass complete"
        );
        TableClassification {
            columns,
            role,
            review_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Value;
    use crate::profile::column::ColumnAccumulator;

    fn profile_of(name: &str, values: Vec<Value>) -> ColumnProfile {
        let config = PipelineConfig::default();
        let mut acc = ColumnAccumulator::new(name, &config);
        for v in &values {
            acc.observe(v);
        }
        acc.finalize()
    }

    fn int_seq(name: &str, n: i64) -> ColumnProfile {
        profile_of(name, (0..n).map(Value::Integer).collect())
    }

    #[test]
    fn id_column_wins_over_numeric_rules() {
        let config = PipelineConfig::default();
        let profile = int_seq("customer_id", 100);
        let class = EntityClassifier::classify_column(&profile, &config);
        assert_eq!(class.role, ColumnRole::NaturalKey);
        assert_eq!(class.decided_by, "id_name_pattern");
    }

    #[test]
    fn same_profiles_classify_identically() {
        let config = PipelineConfig::default();
        let profiles = vec![
            int_seq("order_id", 50),
            profile_of("amount", (0..50).map(|i| Value::Float(i as f64 * 1.5)).collect()),
            profile_of(
                "status",
                (0..50)
                    .map(|i| Value::Text(if i % 2 == 0 { "open" } else { "closed" }.into()))
                    .collect(),
            ),
        ];
        let a = EntityClassifier::classify(&profiles, &[], &config);
        let b = EntityClassifier::classify(&profiles, &[], &config);
        assert_eq!(a.columns, b.columns);
        assert_eq!(a.role, b.role);
    }

    #[test]
    fn measures_make_a_fact_table() {
        let config = PipelineConfig::default();
        let profiles = vec![
            int_seq("txn_id", 40),
            profile_of("amount", (0..40).map(|i| Value::Float(i as f64)).collect()),
        ];
        let class = EntityClassifier::classify(&profiles, &[], &config);
        assert_eq!(class.role, TableRole::Fact);
    }

    #[test]
    fn no_measures_means_dimension_source() {
        let config = PipelineConfig::default();
        let profiles = vec![
            int_seq("customer_id", 40),
            profile_of(
                "segment",
                (0..40)
                    .map(|i| Value::Text(if i % 3 == 0 { "retail" } else { "corp" }.into()))
                    .collect(),
            ),
        ];
        let class = EntityClassifier::classify(&profiles, &[], &config);
        assert_eq!(class.role, TableRole::Dimension);
    }

    #[test]
    fn dimension_without_stable_key_is_flagged() {
        let config = PipelineConfig::default();
        let profiles = vec![profile_of(
            "segment",
            (0..40)
                .map(|i| Value::Text(if i % 3 == 0 { "retail" } else { "corp" }.into()))
                .collect(),
        )];
        let class = EntityClassifier::classify(&profiles, &[], &config);
        assert_eq!(class.role, TableRole::Dimension);
        assert!(
            class
                .review_flags
                .iter()
                .any(|f| f.contains("best guess"))
        );

        let clean = KeyCandidate {
            columns: vec!["segment_id".to_string()],
            uniqueness: 1.0,
            null_ratio: 0.0,
            distinct_count: 40,
        };
        let keyed = EntityClassifier::classify(&profiles, &[clean], &config);
        assert!(!keyed.review_flags.iter().any(|f| f.contains("best guess")));
    }

    #[test]
    fn fact_without_clean_key_is_flagged() {
        let config = PipelineConfig::default();
        let profiles = vec![profile_of(
            "amount",
            (0..40).map(|i| Value::Float(i as f64)).collect(),
        )];
        let class = EntityClassifier::classify(&profiles, &[], &config);
        assert_eq!(class.role, TableRole::Fact);
        assert!(
            class
                .review_flags
                .iter()
                .any(|f| f.contains("synthetic"))
        );
    }
}
