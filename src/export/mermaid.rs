//! Mermaid ER diagram export

use crate::models::{DimensionalModel, SqlType};

use super::{ExportError, ExportResult};

/// Column cap per table block; wide tables get an ellipsis row so diagrams
/// stay readable.
const MAX_COLUMNS: usize = 10;

pub struct MermaidExporter;

impl MermaidExporter {
    pub fn export(model: &DimensionalModel) -> Result<ExportResult, ExportError> {
        model
            .validate()
            .map_err(|e| ExportError::ValidationError(e.to_string()))?;

        let mut out = String::from("erDiagram\n");
        for table in &model.tables {
            out.push_str(&format!("    {} {{\n", table.name));
            for col in table.columns.iter().take(MAX_COLUMNS) {
                let mut line = format!(
                    "        {} {}",
                    Self::mermaid_type(col.sql_type),
                    col.name
                );
                if table.primary_key.contains(&col.name) {
                    line.push_str(" PK");
                } else if col.references.is_some() {
                    line.push_str(" FK");
                }
                out.push_str(&line);
                out.push('\n');
            }
            if table.columns.len() > MAX_COLUMNS {
                out.push_str(&format!(
                    "        TEXT MORE_COLUMNS \"{} not shown\"\n",
                    table.columns.len() - MAX_COLUMNS
                ));
            }
            out.push_str("    }\n");
        }

        for rel in &model.relationships {
            // One dimension row serves many fact rows.
            out.push_str(&format!(
                "    {} ||--o{{ {} : \"{}\"\n",
                rel.to_table, rel.from_table, rel.from_column
            ));
        }
        Ok(ExportResult {
            content: out,
            format: "mermaid".to_string(),
        })
    }

    /// Mermaid attribute types cannot carry parentheses or commas.
    fn mermaid_type(sql_type: SqlType) -> &'static str {
        match sql_type {
            SqlType::Number | SqlType::Decimal => "NUMBER",
            SqlType::Float => "FLOAT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::TimestampNtz => "TIMESTAMP",
            SqlType::Text => "TEXT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        LogicalColumn, LogicalTable, Relationship, SchemaStrategy, TableKind,
    };

    #[test]
    fn diagram_lists_tables_and_edges() {
        let mut fact = LogicalTable::new(
            "FACT_ORDERS",
            TableKind::Fact,
            vec![
                LogicalColumn::new("FACT_SK", SqlType::Text),
                LogicalColumn::new("CUSTOMER_FK", SqlType::Text)
                    .with_reference("DIM_CUSTOMER", "CUSTOMER_SK"),
            ],
        );
        fact.primary_key = vec!["FACT_SK".to_string()];
        let mut dim = LogicalTable::new(
            "DIM_CUSTOMER",
            TableKind::Dimension,
            vec![LogicalColumn::new("CUSTOMER_SK", SqlType::Text)],
        );
        dim.primary_key = vec!["CUSTOMER_SK".to_string()];
        let model = DimensionalModel {
            source_name: "orders.csv".to_string(),
            strategy: SchemaStrategy::Star,
            tables: vec![fact, dim],
            relationships: vec![Relationship::new(
                "FACT_ORDERS",
                "CUSTOMER_FK",
                "DIM_CUSTOMER",
                "CUSTOMER_SK",
            )],
            review_flags: Vec::new(),
        };
        let erd = MermaidExporter::export(&model).unwrap();
        assert!(erd.content.starts_with("erDiagram"));
        assert!(erd.content.contains("FACT_ORDERS {"));
        assert!(erd.content.contains("TEXT FACT_SK PK"));
        assert!(erd.content.contains("TEXT CUSTOMER_FK FK"));
        assert!(
            erd.content
                .contains("DIM_CUSTOMER ||--o{ FACT_ORDERS : \"CUSTOMER_FK\"")
        );
    }

    #[test]
    fn wide_tables_are_truncated() {
        let columns: Vec<LogicalColumn> = (0..15)
            .map(|i| LogicalColumn::new(&format!("C{i}"), SqlType::Text))
            .collect();
        let table = LogicalTable::new("FACT_WIDE", TableKind::Fact, columns);
        let model = DimensionalModel {
            source_name: "wide.csv".to_string(),
            strategy: SchemaStrategy::Star,
            tables: vec![table],
            relationships: Vec::new(),
            review_flags: Vec::new(),
        };
        let erd = MermaidExporter::export(&model).unwrap();
        assert!(erd.content.contains("5 not shown"));
        assert!(!erd.content.contains("C12"));
    }
}
