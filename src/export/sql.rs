//! Snowflake DDL export
//!
//! Emits `CREATE OR REPLACE TABLE` statements for every table in the model.
//! Output is a pure function of the model; no timestamps or environment
//! details leak in, so re-running a pipeline produces byte-identical DDL.

use crate::config::PipelineConfig;
use crate::models::{DimensionalModel, LogicalTable};

use super::{ExportError, ExportResult};

pub struct SqlExporter;

impl SqlExporter {
    /// Render the full DDL script for a model.
    pub fn export(
        model: &DimensionalModel,
        config: &PipelineConfig,
    ) -> Result<ExportResult, ExportError> {
        model
            .validate()
            .map_err(|e| ExportError::ValidationError(e.to_string()))?;

        let mut out = String::new();
        out.push_str(&format!("-- Dimensional model for {}\n", model.source_name));
        out.push_str(&format!("USE DATABASE {};\n", config.database));
        out.push_str(&format!("USE SCHEMA {};\n\n", config.schema));

        for table in &model.tables {
            Self::render_table(&mut out, table);
            out.push('\n');
        }
        Ok(ExportResult {
            content: out,
            format: "sql".to_string(),
        })
    }

    fn render_table(out: &mut String, table: &LogicalTable) {
        out.push_str(&format!("CREATE OR REPLACE TABLE {} (\n", table.name));
        let last = table.columns.len().saturating_sub(1);
        for (i, col) in table.columns.iter().enumerate() {
            out.push_str(&format!("    {} {}", col.name, col.sql_type.ddl()));
            if !col.nullable {
                out.push_str(" NOT NULL");
            }
            if i != last {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str(");\n");

        if !table.primary_key.is_empty() {
            out.push_str(&format!("-- Primary Key: {}\n", table.primary_key.join(", ")));
        }
        if let Some(grain) = &table.grain {
            out.push_str(&format!("-- Grain: {grain}\n"));
        }
        for col in &table.columns {
            if let Some(fk) = &col.references {
                out.push_str(&format!(
                    "-- Foreign Key: {} REFERENCES {}({})\n",
                    col.name, fk.table, fk.column
                ));
            }
        }
        if !table.clustering_key.is_empty() {
            out.push_str(&format!(
                "-- Recommended: ALTER TABLE {} CLUSTER BY ({});\n",
                table.name,
                table.clustering_key.join(", ")
            ));
        }
    }
}
