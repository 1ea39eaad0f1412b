//! Enums for the dimensional model
//!
//! # Serde Casing Conventions
//!
//! Technical/database constants (`SqlType`, `ScdPattern`, `TableKind`) use
//! `SCREAMING_SNAKE_CASE` to match warehouse conventions; `SchemaStrategy`
//! uses `camelCase` because it only appears in run artifacts.

use serde::{Deserialize, Serialize};

/// Physical column type in the target warehouse dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SqlType {
    Number,
    Decimal,
    Float,
    Boolean,
    Date,
    TimestampNtz,
    Text,
}

impl SqlType {
    /// The DDL spelling of this type.
    pub fn ddl(&self) -> &'static str {
        match self {
            SqlType::Number => "NUMBER(38,0)",
            SqlType::Decimal => "NUMBER(38,2)",
            SqlType::Float => "FLOAT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Date => "DATE",
            SqlType::TimestampNtz => "TIMESTAMP_NTZ",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScdPattern {
    Type1,
    Type2,
}

/// Kind of table in the generated model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableKind {
    Fact,
    Dimension,
    DateDimension,
    /// Child table extracted from a repeating-group column.
    Child,
}

/// Overall shape of the generated schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaStrategy {
    Star,
    ThirdNormalForm,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_spellings() {
        assert_eq!(SqlType::Number.ddl(), "NUMBER(38,0)");
        assert_eq!(SqlType::Decimal.ddl(), "NUMBER(38,2)");
        assert_eq!(SqlType::TimestampNtz.ddl(), "TIMESTAMP_NTZ");
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&TableKind::DateDimension).unwrap(),
            "\"DATE_DIMENSION\""
        );
    }
}
