//! The complete generated model

use std::collections::HashMap;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};

use super::enums::{SchemaStrategy, TableKind};
use super::relationship::Relationship;
use super::table::LogicalTable;

/// Structural problems in a generated model.
#[derive(Debug, thiserror::Error)]
pub enum ModelValidationError {
    #[error("duplicate table name {0}")]
    DuplicateTable(String),
    #[error("relationship references missing table {0}")]
    MissingTable(String),
    #[error("relationship references missing column {table}.{column}")]
    MissingColumn { table: String, column: String },
    #[error("relationship graph contains a cycle")]
    CyclicRelationships,
}

/// The full output of the modeling pass: tables, relationships, and the
/// review flags accumulated along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionalModel {
    pub source_name: String,
    pub strategy: SchemaStrategy,
    pub tables: Vec<LogicalTable>,
    pub relationships: Vec<Relationship>,
    /// Non-fatal concerns carried from classification and modeling.
    #[serde(default)]
    pub review_flags: Vec<String>,
}

impl DimensionalModel {
    pub fn table(&self, name: &str) -> Option<&LogicalTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn fact_table(&self) -> Option<&LogicalTable> {
        self.tables.iter().find(|t| t.kind == TableKind::Fact)
    }

    pub fn dimensions(&self) -> Vec<&LogicalTable> {
        self.tables
            .iter()
            .filter(|t| matches!(t.kind, TableKind::Dimension | TableKind::DateDimension))
            .collect()
    }

    /// Validate structural integrity: unique names, every relationship
    /// endpoint exists, and the relationship graph is acyclic.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        let mut nodes = HashMap::new();
        let mut graph = DiGraph::<&str, ()>::new();
        for table in &self.tables {
            if nodes.contains_key(table.name.as_str()) {
                return Err(ModelValidationError::DuplicateTable(table.name.clone()));
            }
            nodes.insert(table.name.as_str(), graph.add_node(table.name.as_str()));
        }

        for rel in &self.relationships {
            for (table, column) in [
                (&rel.from_table, &rel.from_column),
                (&rel.to_table, &rel.to_column),
            ] {
                let found = self
                    .table(table)
                    .ok_or_else(|| ModelValidationError::MissingTable(table.clone()))?;
                if found.column(column).is_none() {
                    return Err(ModelValidationError::MissingColumn {
                        table: table.clone(),
                        column: column.clone(),
                    });
                }
            }
            graph.add_edge(nodes[rel.from_table.as_str()], nodes[rel.to_table.as_str()], ());
        }

        if is_cyclic_directed(&graph) {
            return Err(ModelValidationError::CyclicRelationships);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::column::LogicalColumn;
    use crate::models::enums::SqlType;

    fn table_with(name: &str, kind: TableKind, cols: &[&str]) -> LogicalTable {
        LogicalTable::new(
            name,
            kind,
            cols.iter()
                .map(|c| LogicalColumn::new(c, SqlType::Text))
                .collect(),
        )
    }

    fn model(tables: Vec<LogicalTable>, relationships: Vec<Relationship>) -> DimensionalModel {
        DimensionalModel {
            source_name: "orders.csv".to_string(),
            strategy: SchemaStrategy::Star,
            tables,
            relationships,
            review_flags: Vec::new(),
        }
    }

    #[test]
    fn valid_star_passes() {
        let m = model(
            vec![
                table_with("FACT_ORDERS", TableKind::Fact, &["ORDER_SK", "CUSTOMER_FK"]),
                table_with("DIM_CUSTOMER", TableKind::Dimension, &["CUSTOMER_SK"]),
            ],
            vec![Relationship::new(
                "FACT_ORDERS",
                "CUSTOMER_FK",
                "DIM_CUSTOMER",
                "CUSTOMER_SK",
            )],
        );
        assert!(m.validate().is_ok());
    }

    #[test]
    fn missing_fk_target_is_rejected() {
        let m = model(
            vec![table_with(
                "FACT_ORDERS",
                TableKind::Fact,
                &["ORDER_SK", "CUSTOMER_FK"],
            )],
            vec![Relationship::new(
                "FACT_ORDERS",
                "CUSTOMER_FK",
                "DIM_CUSTOMER",
                "CUSTOMER_SK",
            )],
        );
        assert!(matches!(
            m.validate(),
            Err(ModelValidationError::MissingTable(_))
        ));
    }

    #[test]
    fn cycles_are_rejected() {
        let m = model(
            vec![
                table_with("A", TableKind::Dimension, &["X"]),
                table_with("B", TableKind::Dimension, &["X"]),
            ],
            vec![
                Relationship::new("A", "X", "B", "X"),
                Relationship::new("B", "X", "A", "X"),
            ],
        );
        assert!(matches!(
            m.validate(),
            Err(ModelValidationError::CyclicRelationships)
        ));
    }
}
