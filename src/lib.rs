//! Automated dimensional modeling over typed row batches
//!
//! Provides the four pipeline passes and their supporting types:
//! - Streaming column profiling with mergeable sketches
//! - Rule-based column and table classification, with grain detection
//! - Star / third-normal-form model generation
//! - Surrogate-key materialization into per-table CSV extracts
//! - DDL, ER diagram, and summary export, plus post-hoc data quality checks

pub mod batch;
pub mod classify;
pub mod config;
pub mod export;
pub mod materialize;
pub mod modeling;
pub mod models;
pub mod pipeline;
pub mod profile;
pub mod validate;

// Re-export commonly used types
pub use batch::{BatchSource, MemorySource, RowBatch, Value};
pub use classify::{
    ColumnRole, EntityClassifier, Grain, GrainDetector, TableClassification, TableRole,
};
pub use config::PipelineConfig;
pub use export::{ExportError, ExportResult, MermaidExporter, SqlExporter, SummaryExporter};
pub use materialize::{MaterializeError, SplitResult, Splitter, SurrogateKeyMap};
pub use modeling::{ModelError, ModelGenerator, SchemaChooser};
pub use pipeline::{Pipeline, PipelineError, PipelineRun};
pub use profile::{
    ColumnProfile, ColumnProfiler, InferredType, KeyCandidate, KeyCandidateDetector, ProfileError,
    TableProfile,
};
pub use validate::{DqCheck, DqCheckKind, DqError, DqReport, DqValidator};

// Re-export models
pub use models::{
    DimensionalModel, LogicalColumn, LogicalTable, Relationship, ScdPattern, SchemaStrategy,
    SqlType, TableKind,
};
