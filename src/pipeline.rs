//! End-to-end pipeline
//!
//! Runs the four passes in order (profile, classify, model, materialize),
//! exports the model artifacts, and validates the written extracts. The run
//! output keeps every intermediate so callers can inspect or persist any
//! stage.

use std::path::Path;

use crate::batch::BatchSource;
use crate::classify::{EntityClassifier, Grain, GrainDetector, TableClassification};
use crate::config::PipelineConfig;
use crate::export::{ExportError, ExportResult, MermaidExporter, SqlExporter, SummaryExporter};
use crate::materialize::{MaterializeError, SplitResult, Splitter};
use crate::modeling::{ModelError, ModelGenerator};
use crate::models::DimensionalModel;
use crate::profile::keys::{KeyCandidate, KeyCandidateDetector};
use crate::profile::profiler::{ColumnProfiler, TableProfile};
use crate::profile::{ColumnProfile, ProfileError};
use crate::validate::{DqError, DqReport, DqValidator};

/// Error from any pipeline stage
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Validate(#[from] DqError),
    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything a run produced.
#[derive(Debug)]
pub struct PipelineRun {
    pub profiles: Vec<ColumnProfile>,
    pub table_profile: TableProfile,
    pub candidates: Vec<KeyCandidate>,
    pub classification: TableClassification,
    pub grain: Grain,
    pub model: DimensionalModel,
    pub ddl: ExportResult,
    pub erd: ExportResult,
    pub summary: ExportResult,
    pub split: SplitResult,
    pub dq_report: DqReport,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run every stage against one source, writing extracts and model
    /// artifacts into `out_dir`.
    pub fn run<S: BatchSource + Sync>(
        &self,
        source: &S,
        out_dir: &Path,
    ) -> Result<PipelineRun, PipelineError> {
        tracing::info!(source = source.source_name(), "pipeline starting");

        let (profiles, table_profile) = ColumnProfiler::profile_source(source, &self.config)?;
        let proposals = KeyCandidateDetector::generate(&profiles, &self.config);
        let candidates = KeyCandidateDetector::validate(source, &proposals);
        let classification = EntityClassifier::classify(&profiles, &candidates, &self.config);
        let grain = GrainDetector::detect(&candidates);

        let model = ModelGenerator::generate(
            source.source_name(),
            &profiles,
            &classification,
            &grain,
            &table_profile,
            &self.config,
        )?;

        let ddl = SqlExporter::export(&model, &self.config)?;
        let erd = MermaidExporter::export(&model)?;
        let summary = SummaryExporter::export(&model, &grain)?;

        let split = Splitter::new(&model, &grain).split(source, out_dir)?;
        let dq_report = DqValidator::validate(&model, &split)?;

        std::fs::write(out_dir.join("schema.sql"), &ddl.content)?;
        std::fs::write(out_dir.join("erd.mmd"), &erd.content)?;
        std::fs::write(out_dir.join("summary.md"), &summary.content)?;
        std::fs::write(
            out_dir.join("model.json"),
            serde_json::to_string_pretty(&model)?,
        )?;
        std::fs::write(
            out_dir.join("dq_report.json"),
            serde_json::to_string_pretty(&dq_report)?,
        )?;

        tracing::info!(
            tables = model.tables.len(),
            dq_passed = dq_report.overall_passed,
            "pipeline finished"
        );
        Ok(PipelineRun {
            profiles,
            table_profile,
            candidates,
            classification,
            grain,
            model,
            ddl,
            erd,
            summary,
            split,
            dq_report,
        })
    }
}
