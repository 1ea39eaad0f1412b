//! Column model

use serde::{Deserialize, Serialize};

use super::enums::SqlType;

/// Reference from a foreign key column to the key it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// A column in a generated table.
///
/// # Example
///
/// ```rust
/// use autodim::models::{LogicalColumn, SqlType};
///
/// let col = LogicalColumn::new("CUSTOMER_SK", SqlType::Text);
/// assert!(!col.nullable);
/// assert_eq!(col.sql_type.ddl(), "TEXT");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalColumn {
    /// Physical name, already uppercased for the warehouse.
    pub name: String,
    pub sql_type: SqlType,
    pub nullable: bool,
    /// Source column this was derived from, when one exists. Generated
    /// columns (surrogate keys, metadata) have none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,
    /// Set when this column is a foreign key into another table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKeyRef>,
}

impl LogicalColumn {
    /// Create a non-nullable column with no source lineage.
    pub fn new(name: &str, sql_type: SqlType) -> Self {
        Self {
            name: name.to_string(),
            sql_type,
            nullable: false,
            source_column: None,
            references: None,
        }
    }

    /// Create a nullable column carried over from a source column.
    pub fn from_source(name: &str, sql_type: SqlType, source: &str) -> Self {
        Self {
            name: name.to_string(),
            sql_type,
            nullable: true,
            source_column: Some(source.to_string()),
            references: None,
        }
    }

    pub fn with_reference(mut self, table: &str, column: &str) -> Self {
        self.references = Some(ForeignKeyRef {
            table: table.to_string(),
            column: column.to_string(),
        });
        self
    }
}
