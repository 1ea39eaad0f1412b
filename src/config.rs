//! Pipeline configuration
//!
//! Thresholds that steer profiling, key detection, classification, and model
//! generation. All fields have defaults tuned for transactional sources; they
//! are plain serde structs so callers can load them from JSON config files.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Minimum uniqueness ratio for a column to become a key candidate.
    /// Candidates must still validate at exactly 1.0 to be considered clean.
    pub key_uniqueness_threshold: f64,
    /// Maximum width of composite key candidates (clamped to 3; exhaustive
    /// search beyond that is infeasible).
    pub composite_key_width: usize,
    /// Minimum individual distinctness ratio for a column to seed composite
    /// candidates.
    pub composite_seed_ratio: f64,
    /// Distinct values tracked exactly before switching to the approximate
    /// cardinality estimator.
    pub exact_distinct_limit: usize,
    /// Number of top values reported per column.
    pub top_k: usize,
    /// Size of the bottom-k value sample used for quantile/outlier estimates.
    pub sample_size: usize,
    /// Text columns with distinct ratio above this classify as FREE_TEXT and
    /// are excluded from dimension grouping.
    pub free_text_ratio: f64,
    /// Numeric columns with distinct ratio below this classify as dimension
    /// attributes rather than measures.
    pub measure_distinct_ratio: f64,
    /// Fact tables projected above this row count get a clustering-key
    /// recommendation.
    pub clustering_row_threshold: u64,
    /// Profile batches in parallel. Merges are associative and commutative,
    /// so results do not depend on this flag.
    pub parallel_profiling: bool,
    /// Target database name for the DDL preamble.
    pub database: String,
    /// Target schema name for the DDL preamble.
    pub schema: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            key_uniqueness_threshold: 0.95,
            composite_key_width: 2,
            composite_seed_ratio: 0.3,
            exact_distinct_limit: 10_000,
            top_k: 10,
            sample_size: 4096,
            free_text_ratio: 0.5,
            measure_distinct_ratio: 0.1,
            clustering_row_threshold: 1_000_000,
            parallel_profiling: true,
            database: "ANALYTICS".to_string(),
            schema: "PUBLIC".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Composite width with the hard cap applied.
    pub fn effective_composite_width(&self) -> usize {
        self.composite_key_width.clamp(1, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_width_is_capped() {
        let mut config = PipelineConfig::default();
        config.composite_key_width = 7;
        assert_eq!(config.effective_composite_width(), 3);
        config.composite_key_width = 0;
        assert_eq!(config.effective_composite_width(), 1);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.top_k, config.top_k);
    }
}
