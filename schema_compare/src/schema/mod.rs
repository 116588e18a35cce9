//! Schema module for SchemaCompare
//!
//! This module holds the schema object model and the comparator that diffs two schemas.

pub mod column;
pub mod comparator;
pub mod constraint;
pub mod diff;
pub mod identifier;
pub mod sequence;
pub mod table;
pub mod types;

// Re-export key types
pub use column::{Column, ColumnType, DefaultValue};
pub use comparator::Comparator;
pub use constraint::{ForeignKeyConstraint, Index, ReferentialAction, UniqueConstraint};
pub use diff::{ColumnDiff, SchemaDiff, TableDiff};
pub use identifier::Identifier;
pub use sequence::Sequence;
pub use table::Table;
pub use types::{DatabaseSchema, TableModel};
