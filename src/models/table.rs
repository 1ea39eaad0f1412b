//! Table model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::column::LogicalColumn;
use super::enums::{ScdPattern, TableKind};

/// A table in the generated dimensional model.
///
/// # Example
///
/// ```rust
/// use autodim::models::{LogicalTable, LogicalColumn, SqlType, TableKind};
///
/// let table = LogicalTable::new(
///     "DIM_CUSTOMER",
///     TableKind::Dimension,
///     vec![LogicalColumn::new("CUSTOMER_SK", SqlType::Text)],
/// );
/// assert_eq!(table.id, LogicalTable::generate_id("DIM_CUSTOMER"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalTable {
    /// Deterministic identifier derived from the table name, stable across
    /// runs so diffs of serialized models stay quiet.
    pub id: Uuid,
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<LogicalColumn>,
    /// Primary key column names, in order.
    pub primary_key: Vec<String>,
    /// Source columns forming the natural key, for dimensions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub natural_key: Vec<String>,
    /// Statement of what one row means, for facts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scd_pattern: Option<ScdPattern>,
    /// Suggested clustering columns for large tables.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clustering_key: Vec<String>,
}

impl LogicalTable {
    pub fn new(name: &str, kind: TableKind, columns: Vec<LogicalColumn>) -> Self {
        Self {
            id: Self::generate_id(name),
            name: name.to_string(),
            kind,
            columns,
            primary_key: Vec::new(),
            natural_key: Vec::new(),
            grain: None,
            scd_pattern: None,
            clustering_key: Vec::new(),
        }
    }

    /// UUIDv5 over the table name in the URL namespace. Same name, same id,
    /// on every run and every machine.
    pub fn generate_id(name: &str) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
    }

    pub fn column(&self, name: &str) -> Option<&LogicalColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::SqlType;

    #[test]
    fn ids_are_stable_across_construction() {
        let a = LogicalTable::new(
            "DIM_CUSTOMER",
            TableKind::Dimension,
            vec![LogicalColumn::new("CUSTOMER_SK", SqlType::Text)],
        );
        let b = LogicalTable::new("DIM_CUSTOMER", TableKind::Dimension, vec![]);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, LogicalTable::generate_id("DIM_PRODUCT"));
    }
}
