//! Markdown model summary export
//!
//! A human-readable companion to the DDL: the chosen strategy, the grain and
//! why it was picked, every table with its columns, and anything flagged for
//! review.

use crate::classify::Grain;
use crate::models::{DimensionalModel, TableKind};

use super::{ExportError, ExportResult};

pub struct SummaryExporter;

impl SummaryExporter {
    pub fn export(model: &DimensionalModel, grain: &Grain) -> Result<ExportResult, ExportError> {
        model
            .validate()
            .map_err(|e| ExportError::ValidationError(e.to_string()))?;

        let mut out = String::new();
        out.push_str(&format!("# Dimensional Model: {}\n\n", model.source_name));
        out.push_str(&format!(
            "- **Strategy:** {}\n",
            match model.strategy {
                crate::models::SchemaStrategy::Star => "star schema",
                crate::models::SchemaStrategy::ThirdNormalForm => "third normal form",
            }
        ));
        out.push_str(&format!("- **Grain:** {}\n", grain.description));
        out.push_str(&format!("- **Grain rationale:** {}\n", grain.reason));
        out.push_str(&format!("- **Tables:** {}\n\n", model.tables.len()));

        for table in &model.tables {
            let kind = match table.kind {
                TableKind::Fact => "fact",
                TableKind::Dimension => "dimension",
                TableKind::DateDimension => "date dimension",
                TableKind::Child => "child",
            };
            out.push_str(&format!("## {} ({kind})\n\n", table.name));
            if let Some(g) = &table.grain {
                out.push_str(&format!("Grain: {g}\n\n"));
            }
            if let Some(scd) = table.scd_pattern {
                out.push_str(&format!("SCD pattern: {scd:?}\n\n"));
            }
            if !table.clustering_key.is_empty() {
                out.push_str(&format!(
                    "Clustering key: {}\n\n",
                    table.clustering_key.join(", ")
                ));
            }
            out.push_str("| Column | Type | Nullable | Source |\n");
            out.push_str("|--------|------|----------|--------|\n");
            for col in &table.columns {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    col.name,
                    col.sql_type.ddl(),
                    if col.nullable { "yes" } else { "no" },
                    col.source_column.as_deref().unwrap_or("-"),
                ));
            }
            out.push('\n');
        }

        if !model.relationships.is_empty() {
            out.push_str("## Relationships\n\n");
            for rel in &model.relationships {
                out.push_str(&format!(
                    "- {}.{} -> {}.{}\n",
                    rel.from_table, rel.from_column, rel.to_table, rel.to_column
                ));
            }
            out.push('\n');
        }

        if !model.review_flags.is_empty() {
            out.push_str("## Review Flags\n\n");
            for flag in &model.review_flags {
                out.push_str(&format!("- {flag}\n"));
            }
            out.push('\n');
        }

        Ok(ExportResult {
            content: out,
            format: "markdown".to_string(),
        })
    }
}
