//! Data model types
//!
//! The logical schema the modeling pass produces: tables, columns,
//! relationships, and the enums that describe them. Everything here is plain
//! data with serde derives; behavior lives in the passes that build and
//! consume these types.

pub mod column;
pub mod data_model;
pub mod enums;
pub mod relationship;
pub mod table;

pub use column::{ForeignKeyRef, LogicalColumn};
pub use data_model::{DimensionalModel, ModelValidationError};
pub use enums::{ScdPattern, SchemaStrategy, SqlType, TableKind};
pub use relationship::Relationship;
pub use table::LogicalTable;
