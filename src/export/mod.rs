//! Export functionality
//!
//! Provides exporters for the generated model:
//! - Snowflake DDL
//! - Mermaid ER diagram
//! - Markdown model summary

pub mod mermaid;
pub mod sql;
pub mod summary;

/// Result of an export operation.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[must_use = "export results contain the exported content and should be used"]
pub struct ExportResult {
    /// Exported content
    pub content: String,
    /// Format identifier
    pub format: String,
}

/// Error during export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Export error: {0}")]
    ExportError(String),
}

// Re-export for convenience
pub use mermaid::MermaidExporter;
pub use sql::SqlExporter;
pub use summary::SummaryExporter;
